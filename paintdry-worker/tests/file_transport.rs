use paintdry_model::{ModuleRequest, ModuleResponse};
use paintdry_worker::{ExampleModule, handle_files};
use serde_json::json;
use tempfile::TempDir;

fn queue() -> (TempDir, std::path::PathBuf, std::path::PathBuf) {
    let root = tempfile::tempdir().unwrap();
    let input = root.path().join("requests");
    let output = root.path().join("responses");
    std::fs::create_dir_all(&input).unwrap();
    std::fs::create_dir_all(&output).unwrap();
    (root, input, output)
}

#[tokio::test]
async fn answers_request_file_under_same_name() {
    let (_root, input, output) = queue();
    let batch = vec![
        ModuleRequest::discovery("localhost", "example", "config", 1),
        ModuleRequest::observation("localhost", "example", 1),
    ];
    std::fs::write(input.join("abc.json"), serde_json::to_vec(&batch).unwrap()).unwrap();

    let handled = handle_files(&ExampleModule, &input, &output).await.unwrap();

    assert_eq!(handled, 1);
    assert!(!input.join("abc.json").exists());
    assert!(!output.join("abc.json.tmp").exists());
    let responses: Vec<ModuleResponse> =
        serde_json::from_slice(&std::fs::read(output.join("abc.json")).unwrap()).unwrap();
    assert_eq!(responses.len(), 2);
}

#[tokio::test]
async fn accepts_single_object_files() {
    let (_root, input, output) = queue();
    let request = ModuleRequest::discovery("localhost", "example", "config", 1);
    std::fs::write(input.join("one.json"), serde_json::to_vec(&request).unwrap()).unwrap();

    handle_files(&ExampleModule, &input, &output).await.unwrap();

    let responses: Vec<ModuleResponse> =
        serde_json::from_slice(&std::fs::read(output.join("one.json")).unwrap()).unwrap();
    assert_eq!(responses.len(), 1);
}

#[tokio::test]
async fn malformed_files_are_set_aside_and_other_files_ignored() {
    let (_root, input, output) = queue();
    std::fs::write(
        input.join("bad.json"),
        json!([{"operation": "discovery", "resource": "x"}]).to_string(),
    )
    .unwrap();
    std::fs::write(input.join("notes.txt"), "ignore me").unwrap();

    let handled = handle_files(&ExampleModule, &input, &output).await.unwrap();

    assert_eq!(handled, 0);
    assert!(input.join("bad.json.rejected").exists());
    assert!(input.join("notes.txt").exists());
    assert_eq!(std::fs::read_dir(&output).unwrap().count(), 0);
}

#[tokio::test]
async fn identical_files_are_answered_once() {
    let (_root, input, output) = queue();
    let batch = serde_json::to_vec(&vec![ModuleRequest::discovery(
        "localhost", "example", "config", 1,
    )])
    .unwrap();
    std::fs::write(input.join("a.json"), &batch).unwrap();
    std::fs::write(input.join("b.json"), &batch).unwrap();

    let handled = handle_files(&ExampleModule, &input, &output).await.unwrap();

    assert_eq!(handled, 1);
    assert!(output.join("a.json").exists());
    assert!(!output.join("b.json").exists());
    assert_eq!(std::fs::read_dir(&input).unwrap().count(), 0);
}

#[tokio::test]
async fn missing_directories_are_reported() {
    let (root, input, _output) = queue();
    let missing = root.path().join("nope");
    assert!(handle_files(&ExampleModule, &input, &missing).await.is_err());
}
