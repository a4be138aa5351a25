use std::io::Write;

use complaint_scout::collect::ItemSink;
use complaint_scout::storage::{read_ndjson, StreamSink};
use complaint_scout::{OutputFormat, RawItem};

fn item(n: u32) -> RawItem {
    RawItem::new(
        format!("  投诉 {n} "),
        "内容",
        "2024-03-05",
        format!("/complaint/view/{n}/"),
    )
}

#[test]
fn appended_items_are_compacted_into_json() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = StreamSink::create(dir.path(), "众花", OutputFormat::Both).unwrap();
    let ndjson = sink.ndjson_path().to_path_buf();
    assert!(ndjson.exists());

    sink.append(&[item(1), item(2)], "众花").unwrap();
    sink.append(&[], "众花").unwrap();
    sink.append(&[item(3)], "众花").unwrap();
    assert_eq!(sink.appended(), 3);
    assert_eq!(std::fs::read_to_string(&ndjson).unwrap().lines().count(), 3);

    let paths = sink.finalize().unwrap();
    let json: Vec<serde_json::Value> =
        serde_json::from_str(&std::fs::read_to_string(paths.json.unwrap()).unwrap()).unwrap();
    assert_eq!(json.len(), 3);
    assert_eq!(json[0]["title"], "投诉 1");
    assert_eq!(json[0]["href"], "/complaint/view/1/");
    assert_eq!(json[2]["keyword"], "众花");

    let mut reader = csv::Reader::from_path(paths.csv.unwrap()).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
    assert_eq!(headers, vec!["title", "content", "time", "href", "keyword"]);
    assert_eq!(reader.records().count(), 3);
}

#[test]
fn malformed_lines_are_skipped_on_finalize() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = StreamSink::create(dir.path(), "kw", OutputFormat::Json).unwrap();
    sink.append(&[item(1)], "kw").unwrap();

    // a crash mid-write leaves a torn line behind
    let mut raw = std::fs::OpenOptions::new()
        .append(true)
        .open(sink.ndjson_path())
        .unwrap();
    raw.write_all(b"{\"title\": \"torn\n\n").unwrap();
    drop(raw);
    sink.append(&[item(2)], "kw").unwrap();

    let paths = sink.finalize().unwrap();
    assert!(paths.csv.is_none());
    let json: Vec<serde_json::Value> =
        serde_json::from_str(&std::fs::read_to_string(paths.json.unwrap()).unwrap()).unwrap();
    let hrefs: Vec<&str> = json.iter().filter_map(|v| v["href"].as_str()).collect();
    assert_eq!(hrefs, vec!["/complaint/view/1/", "/complaint/view/2/"]);
}

#[test]
fn line_torn_inside_a_character_is_skipped_on_finalize() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = StreamSink::create(dir.path(), "kw", OutputFormat::Json).unwrap();
    sink.append(&[item(1)], "kw").unwrap();

    // first two bytes of 投 only
    let mut raw = std::fs::OpenOptions::new()
        .append(true)
        .open(sink.ndjson_path())
        .unwrap();
    raw.write_all(b"{\"title\": \"\xE6\x8A\n").unwrap();
    drop(raw);
    sink.append(&[item(2)], "kw").unwrap();

    let paths = sink.finalize().unwrap();
    let json: Vec<serde_json::Value> =
        serde_json::from_str(&std::fs::read_to_string(paths.json.unwrap()).unwrap()).unwrap();
    let hrefs: Vec<&str> = json.iter().filter_map(|v| v["href"].as_str()).collect();
    assert_eq!(hrefs, vec!["/complaint/view/1/", "/complaint/view/2/"]);
}

#[test]
fn csv_only_keeps_the_log_but_writes_no_json() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = StreamSink::create(dir.path(), "https://x/y", OutputFormat::Csv).unwrap();
    sink.append(&[item(7)], "https://x/y").unwrap();
    let ndjson = sink.ndjson_path().to_path_buf();

    let paths = sink.finalize().unwrap();
    assert!(paths.json.is_none());
    let csv = paths.csv.unwrap();
    assert!(csv.file_name().unwrap().to_string_lossy().starts_with("https___x_y_"));

    let logged = read_ndjson(&ndjson).unwrap();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0]["keyword"], "https://x/y");
}
