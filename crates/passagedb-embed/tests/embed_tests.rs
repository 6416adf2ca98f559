use passagedb_core::config::{EncoderKind, EncoderSpec};
use passagedb_core::Encoder;
use passagedb_embed::{load_encoder, HashEncoder};

fn spec(kind: EncoderKind, dim: Option<usize>) -> EncoderSpec {
    EncoderSpec { kind, model_dir: None, dim, max_len: None, build_on_miss: true }
}

#[test]
fn hash_encoder_shapes_and_determinism() {
    let encoder = HashEncoder::new(256);
    let texts = vec!["hello world".to_string(), "Hello World".to_string()];
    let embs = encoder.encode_batch(&texts).expect("encode_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 256, "embedding dim is 256");
    assert_eq!(encoder.id(), "hash:xxh64:d256");

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    // case-folded tokens hash identically
    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn hash_encoder_empty_text_is_zero_vector() {
    let v = HashEncoder::new(8).encode("").expect("encode");
    assert!(v.iter().all(|x| *x == 0.0));
}

#[test]
fn hash_kind_loads_without_model_files() {
    let encoder = load_encoder(&spec(EncoderKind::Hash, Some(64))).expect("hash encoder");
    assert_eq!(encoder.dim(), 64);
}

#[test]
fn missing_model_dir_is_an_error() {
    let tmp = tempfile::tempdir().expect("tmp");
    let mut s = spec(EncoderKind::Minilm, None);
    s.model_dir = Some(tmp.path().join("absent").to_string_lossy().to_string());
    if !passagedb_embed::use_fake_embeddings() {
        assert!(load_encoder(&s).is_err());
    }
}
