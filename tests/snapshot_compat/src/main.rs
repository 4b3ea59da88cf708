fn main() {
    println!("Run `cargo test -p snapshot-compat` to execute snapshot compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Cursor;
    use std::path::{Path, PathBuf};

    use iocopy_engine::{CopyOptions, StopSignal};
    use iocopy_task::{
        DownloadTask, FileCopyTask, FileHashTask, HttpSource, MultiHashTask, Outcome, Task, run,
    };

    const CONTENT: &[u8] = b"hello, world";
    const SHA256_HELLO_WORLD: &str =
        "09CA7E4EAA6E8AE9C7D261167129184883644D07DFBA7CBFBC4C8A2E08360D5B";
    const SHA1_HELLO_WORLD: &str = "B7E23EC29AF22B0B4E41DA31E868D57226121C84";
    const CRC32_HELLO_WORLD: &str = "FFAB723A";

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture with every `{DIR}` replaced by `dir`.
    fn load_fixture(name: &str, dir: &Path) -> Vec<u8> {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        data.replace("{DIR}", &dir.display().to_string()).into_bytes()
    }

    /// Reduces a JSON value to its structure: object keys and value kinds.
    fn shape(v: &serde_json::Value) -> serde_json::Value {
        use serde_json::Value;
        match v {
            Value::Object(map) => {
                Value::Object(map.iter().map(|(k, v)| (k.clone(), shape(v))).collect())
            }
            Value::Array(arr) => Value::Array(arr.iter().map(shape).collect()),
            Value::String(_) => Value::from("string"),
            Value::Number(_) => Value::from("number"),
            Value::Bool(_) => Value::from("bool"),
            Value::Null => Value::Null,
        }
    }

    /// Asserts that a snapshot produced now has the same structure as the fixture.
    fn assert_same_shape(name: &str, fixture: &[u8], snapshot: &[u8]) {
        let fixture: serde_json::Value = serde_json::from_slice(fixture).unwrap();
        let snapshot: serde_json::Value = serde_json::from_slice(snapshot).unwrap();
        assert_eq!(
            shape(&fixture),
            shape(&snapshot),
            "snapshot shape drifted for {name}:\n  fixture:  {fixture}\n  snapshot: {snapshot}"
        );
    }

    fn hex_sums(sums: &std::collections::BTreeMap<String, Vec<u8>>) -> Vec<(String, String)> {
        sums.iter()
            .map(|(k, v)| (k.clone(), hex::encode_upper(v)))
            .collect()
    }

    #[tokio::test]
    async fn fixture_multi_hash() {
        let tmp = tempfile::tempdir().unwrap();
        let fixture = load_fixture("multi_hash.json", tmp.path());

        let mut task = MultiHashTask::load(&fixture, Cursor::new(CONTENT[7..].to_vec())).unwrap();
        assert_eq!(task.copied(), 7);
        assert_eq!(task.total(), None);

        let outcome = run(&mut task, CopyOptions::new(), StopSignal::new(), &mut ()).await;
        assert!(outcome.is_completed(), "{outcome:?}");
        assert_eq!(
            hex_sums(&task.checksums().unwrap()),
            vec![
                ("CRC-32".to_string(), CRC32_HELLO_WORLD.to_string()),
                ("SHA-256".to_string(), SHA256_HELLO_WORLD.to_string()),
            ]
        );

        assert_same_shape("multi_hash.json", &fixture, &task.snapshot().unwrap());
    }

    #[tokio::test]
    async fn fixture_multi_hash_result_document() {
        let tmp = tempfile::tempdir().unwrap();
        let fixture = load_fixture("multi_hash.json", tmp.path());

        let mut task = MultiHashTask::load(&fixture, Cursor::new(CONTENT[7..].to_vec())).unwrap();
        let Outcome::Completed { result, .. } =
            run(&mut task, CopyOptions::new(), StopSignal::new(), &mut ()).await
        else {
            panic!("expected Completed");
        };

        let result: serde_json::Value = serde_json::from_slice(&result.unwrap()).unwrap();
        assert_eq!(
            result,
            serde_json::json!({
                "checksums": {
                    "CRC-32": CRC32_HELLO_WORLD,
                    "SHA-256": SHA256_HELLO_WORLD,
                }
            })
        );
    }

    #[tokio::test]
    async fn fixture_file_hash() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("hello.txt"), CONTENT).unwrap();
        let fixture = load_fixture("file_hash.json", tmp.path());

        let mut task = FileHashTask::load(&fixture).await.unwrap();
        assert_eq!(task.copied(), 7);
        assert_eq!(task.total(), Some(12));

        let outcome = run(&mut task, CopyOptions::new(), StopSignal::new(), &mut ()).await;
        assert!(outcome.is_completed(), "{outcome:?}");
        assert_eq!(
            hex_sums(&task.checksums().unwrap()),
            vec![("SHA-1".to_string(), SHA1_HELLO_WORLD.to_string())]
        );

        assert_same_shape("file_hash.json", &fixture, &task.snapshot().unwrap());
    }

    #[tokio::test]
    async fn fixture_file_copy() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("hello.txt"), CONTENT).unwrap();
        fs::write(tmp.path().join("copy.txt"), &CONTENT[..7]).unwrap();
        let fixture = load_fixture("file_copy.json", tmp.path());

        let mut task = FileCopyTask::load(&fixture).await.unwrap();
        assert_eq!(task.copied(), 7);

        let outcome = run(&mut task, CopyOptions::new(), StopSignal::new(), &mut ()).await;
        let Outcome::Completed { progress, .. } = outcome else {
            panic!("expected Completed, got {outcome:?}");
        };
        assert_eq!(progress.written, 5);
        assert_eq!(progress.percent, 100.0);

        assert_same_shape("file_copy.json", &fixture, &task.snapshot().unwrap());
        drop(task);
        assert_eq!(fs::read(tmp.path().join("copy.txt")).unwrap(), CONTENT);
    }

    #[tokio::test]
    async fn fixture_download() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("download.txt"), CONTENT).unwrap();
        let fixture = load_fixture("download.json", tmp.path());

        // Everything is already downloaded, so loading needs no server.
        let source = HttpSource::new().unwrap();
        let mut task = DownloadTask::load(&fixture, &source).await.unwrap();
        assert_eq!(task.copied(), 12);
        assert_eq!(task.total(), Some(12));

        let outcome = run(&mut task, CopyOptions::new(), StopSignal::new(), &mut ()).await;
        assert!(outcome.is_completed(), "{outcome:?}");

        assert_same_shape("download.json", &fixture, &task.snapshot().unwrap());
        drop(task);
        assert_eq!(fs::read(tmp.path().join("download.txt")).unwrap(), CONTENT);
    }

    #[test]
    fn fixtures_use_string_counters() {
        let tmp = tempfile::tempdir().unwrap();
        for (name, keys) in [
            ("download.json", &["size", "downloaded"][..]),
            ("file_copy.json", &["size", "copied"][..]),
            ("multi_hash.json", &["computed"][..]),
            ("file_hash.json", &["size", "computed"][..]),
        ] {
            let value: serde_json::Value =
                serde_json::from_slice(&load_fixture(name, tmp.path())).unwrap();
            for key in keys {
                assert!(value[key].is_string(), "{name}: {key} must be a string");
            }
        }
    }
}
