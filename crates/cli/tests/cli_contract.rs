use assert_cmd::cargo::cargo_bin_cmd;
use lopdf::{dictionary, Document, Object};
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

fn write_pdf(dir: &Path, name: &str, page_count: usize) -> PathBuf {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids: Vec<Object> = Vec::with_capacity(page_count);
    for _ in 0..page_count {
        let page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        kids.push(doc.add_object(page).into());
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_count as i64,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("fixture save should succeed");

    let path = dir.join(name);
    fs::write(&path, bytes).expect("fixture write should succeed");
    path
}

fn write_png(dir: &Path, name: &str) -> PathBuf {
    let image = image::RgbaImage::from_pixel(32, 48, image::Rgba([255, 255, 255, 255]));
    let path = dir.join(name);
    image.save(&path).expect("fixture save should succeed");
    path
}

#[test]
fn info_emits_stable_json_contract() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let sheet = write_pdf(temp.path(), "two-page.pdf", 2);

    let output = cargo_bin_cmd!("redpen")
        .arg("info")
        .arg(&sheet)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let mut value: Value =
        serde_json::from_slice(&output).expect("stdout should contain valid json");
    value["files"][0]["path"] = Value::String("<FIXTURE>".to_owned());

    let json = serde_json::to_string_pretty(&value).expect("json should reserialize");
    insta::assert_snapshot!("cli_info_two_page_pdf", json);
}

#[test]
fn info_probes_a_batch_in_upload_order() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = write_pdf(temp.path(), "two-page.pdf", 2);
    let scan = write_png(temp.path(), "scan.png");

    let output = cargo_bin_cmd!("redpen")
        .arg("info")
        .arg(&pdf)
        .arg(&scan)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: Value = serde_json::from_slice(&output).expect("stdout should contain valid json");
    assert_eq!(value["total_pages"], 3);
    assert_eq!(value["files"][0]["format"], "pdf");
    assert_eq!(value["files"][0]["page_count"], 2);
    assert_eq!(value["files"][1]["format"], "png");
    assert_eq!(value["files"][1]["page_count"], 1);
}

#[test]
fn render_writes_png_at_requested_scale() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let sheet = write_pdf(temp.path(), "two-page.pdf", 2);
    let output_path = temp.path().join("out/page.png");

    cargo_bin_cmd!("redpen")
        .arg("render")
        .arg(&sheet)
        .arg("--page")
        .arg("2")
        .arg("--scale")
        .arg("2.0")
        .arg("--output")
        .arg(&output_path)
        .assert()
        .success();

    assert!(output_path.exists(), "render output file should exist");

    let image = image::open(&output_path).expect("render output should be a readable image");
    assert_eq!(image.width(), 1190);
    assert_eq!(image.height(), 1684);
}

#[test]
fn render_rejects_page_zero() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let sheet = write_pdf(temp.path(), "one-page.pdf", 1);

    cargo_bin_cmd!("redpen")
        .arg("render")
        .arg(&sheet)
        .arg("--page")
        .arg("0")
        .assert()
        .failure()
        .stderr(predicate::str::contains("1-based"));
}

#[test]
fn grade_prints_marksheet_json() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let sheet = write_pdf(temp.path(), "answers.pdf", 2);

    cargo_bin_cmd!("redpen")
        .arg("grade")
        .arg(&sheet)
        .arg("--count")
        .arg("2")
        .arg("--marks")
        .arg("9.5,8")
        .arg("--name")
        .arg("Asha Verma")
        .arg("--roll")
        .arg("R-31")
        .arg("--paper")
        .arg("Algebra Midterm")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"percentage\": 87.5"))
        .stdout(predicate::str::contains("\"grade\": \"A\""))
        .stdout(predicate::str::contains("\"roll_no\": \"R-31\""));
}

#[test]
fn grade_reads_question_list_from_file() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let sheet = write_png(temp.path(), "scan.png");
    let questions = temp.path().join("questions.json");
    fs::write(
        &questions,
        r#"[{"label": "Q1", "max_marks": 5.0}, {"label": "Q2", "max_marks": 15.0}]"#,
    )
    .expect("fixture write should succeed");

    cargo_bin_cmd!("redpen")
        .arg("grade")
        .arg(&sheet)
        .arg("--questions")
        .arg(&questions)
        .arg("--marks")
        .arg("5,12")
        .arg("--name")
        .arg("Asha Verma")
        .arg("--roll")
        .arg("R-31")
        .arg("--paper")
        .arg("Algebra Midterm")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"percentage\": 85.0"))
        .stdout(predicate::str::contains("\"grade\": \"A\""));
}

#[test]
fn grade_refuses_unmarked_questions_without_override() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let sheet = write_png(temp.path(), "scan.png");

    cargo_bin_cmd!("redpen")
        .arg("grade")
        .arg(&sheet)
        .arg("--count")
        .arg("3")
        .arg("--marks")
        .arg("5")
        .arg("--name")
        .arg("Asha Verma")
        .arg("--roll")
        .arg("R-31")
        .arg("--paper")
        .arg("Algebra Midterm")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unmarked"))
        .stderr(predicate::str::contains("allow-incomplete"));
}

#[test]
fn grade_refuses_more_marks_than_questions() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let sheet = write_png(temp.path(), "scan.png");

    cargo_bin_cmd!("redpen")
        .arg("grade")
        .arg(&sheet)
        .arg("--count")
        .arg("1")
        .arg("--marks")
        .arg("5,6")
        .arg("--name")
        .arg("Asha Verma")
        .arg("--roll")
        .arg("R-31")
        .arg("--paper")
        .arg("Algebra Midterm")
        .assert()
        .failure()
        .stderr(predicate::str::contains("2 marks given for 1 questions"));
}

#[test]
fn allow_incomplete_scores_zero_and_archives() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let sheet = write_png(temp.path(), "scan.png");
    let archive_root = temp.path().join("archive");

    cargo_bin_cmd!("redpen")
        .arg("grade")
        .arg(&sheet)
        .arg("--count")
        .arg("2")
        .arg("--marks")
        .arg("7")
        .arg("--allow-incomplete")
        .arg("--name")
        .arg("Asha Verma")
        .arg("--roll")
        .arg("R-7")
        .arg("--paper")
        .arg("Algebra Midterm")
        .arg("--archive-root")
        .arg(&archive_root)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"percentage\": 35.0"))
        .stdout(predicate::str::contains("\"grade\": \"F\""));

    cargo_bin_cmd!("redpen")
        .arg("archive")
        .arg("list")
        .arg("--root")
        .arg(&archive_root)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"roll_no\": \"R-7\""))
        .stdout(predicate::str::contains("\"grade\": \"F\""));
}

#[test]
fn archive_stats_aggregate_grades() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let sheet = write_png(temp.path(), "scan.png");
    let archive_root = temp.path().join("archive");

    for (roll, marks) in [("R-1", "9"), ("R-2", "4")] {
        cargo_bin_cmd!("redpen")
            .arg("grade")
            .arg(&sheet)
            .arg("--count")
            .arg("1")
            .arg("--marks")
            .arg(marks)
            .arg("--name")
            .arg("Asha Verma")
            .arg("--roll")
            .arg(roll)
            .arg("--paper")
            .arg("Algebra Midterm")
            .arg("--archive-root")
            .arg(&archive_root)
            .assert()
            .success();
    }

    cargo_bin_cmd!("redpen")
        .arg("archive")
        .arg("stats")
        .arg("--root")
        .arg(&archive_root)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"count\": 2"))
        .stdout(predicate::str::contains("\"mean_percentage\": 65.0"))
        .stdout(predicate::str::contains("\"A+\": 1"))
        .stdout(predicate::str::contains("\"D\": 1"));
}

#[test]
fn info_fails_for_missing_file() {
    cargo_bin_cmd!("redpen")
        .arg("info")
        .arg("missing.pdf")
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn info_fails_for_unsupported_extension() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let notes = temp.path().join("notes.txt");
    fs::write(&notes, "not a sheet").expect("fixture write should succeed");

    cargo_bin_cmd!("redpen")
        .arg("info")
        .arg(&notes)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported file type"));
}

#[test]
fn info_fails_for_invalid_pdf() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let broken = temp.path().join("broken.pdf");
    fs::write(&broken, "not a pdf at all").expect("fixture write should succeed");

    cargo_bin_cmd!("redpen")
        .arg("info")
        .arg(&broken)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open PDF"));
}

#[test]
fn info_fails_for_encrypted_marker_pdf() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let locked = temp.path().join("locked.pdf");
    fs::write(&locked, "%PDF-1.5\n/Encrypt 1 0 R\n").expect("fixture write should succeed");

    cargo_bin_cmd!("redpen")
        .arg("info")
        .arg(&locked)
        .assert()
        .failure()
        .stderr(predicate::str::contains("encrypted PDFs are not supported"));
}

#[test]
fn version_prints_package_version() {
    cargo_bin_cmd!("redpen")
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1.0"));
}
