use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

use passagedb_core::config::{Config, EncoderKind};
use passagedb_core::{CorpusStore, FileSnapshot};

#[test]
fn config_dir_wires_snapshot_and_store() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::create_dir_all(dir.join("storage")).unwrap();
    fs::write(
        dir.join("storage/meta.json"),
        r#"{"1": {"text": "boil water for ten minutes", "source": "water.txt"},
            "0": {"text": "store seeds in a cool dry place", "source": "garden.txt"}}"#,
    )
    .unwrap();
    fs::write(
        dir.join("config.toml"),
        "[corpus]\nsnapshot = \"storage/meta.json\"\n[retrieval]\ntop_k = 4\n[encoders.secondary]\nkind = \"hash\"\ndim = 32\n",
    )
    .unwrap();

    let settings = Config::load_from(dir).expect("config").settings().expect("settings");
    assert_eq!(settings.retrieval.top_k, 4);
    assert_eq!(settings.encoders.secondary.as_ref().map(|s| s.kind), Some(EncoderKind::Hash));

    let store = CorpusStore::new(Box::new(FileSnapshot::new(settings.snapshot_path())));
    let corpus = store.load().expect("corpus");
    assert_eq!(corpus.len(), 2);
    assert_eq!(corpus.get(0).map(|p| p.source.as_str()), Some("garden.txt"));
    assert_eq!(corpus.get(1).map(|p| p.text.as_str()), Some("boil water for ten minutes"));
    assert!(Arc::ptr_eq(&corpus, &store.load().expect("again")));
}

#[test]
fn malformed_snapshot_is_retried_after_repair() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("meta.json");
    fs::write(&path, "{\"0\": {\"text\": \"a\"").unwrap();
    let store = CorpusStore::new(Box::new(FileSnapshot::new(&path)));
    assert!(store.load().expect_err("truncated").is_config());

    fs::write(&path, r#"{"0": {"text": "a", "source": "s"}}"#).unwrap();
    assert_eq!(store.load().expect("repaired").len(), 1);
}
