use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use captioner::{DecoderConfig, TransformerDecoder, Vocabulary};

fn vocabulary(extra: &[&str]) -> Vocabulary {
    let mut tokens = vec!["<NULL>".to_string(), "<START>".to_string()];
    tokens.extend(extra.iter().map(|s| s.to_string()));
    Vocabulary::from_tokens(tokens).unwrap()
}

fn test_config() -> DecoderConfig {
    let mut config = DecoderConfig::new(4, 8, 2, 1, 6);
    config.ff_dim = 16;
    config.dropout_p = None;
    config
}

fn build_decoder(vocab: Vocabulary, config: DecoderConfig) -> TransformerDecoder {
    let device = Device::Cpu;
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    TransformerDecoder::new(vocab, config, vb).unwrap()
}

fn features(batch: usize, dim: usize) -> Tensor {
    let data: Vec<f32> = (0..batch * dim).map(|i| (i as f32) * 0.1 - 0.3).collect();
    Tensor::from_vec(data, (batch, dim), &Device::Cpu).unwrap()
}

fn random_captions(batch: usize, seq: usize, vocab_size: usize) -> Tensor {
    let data: Vec<u32> = (0..batch * seq)
        .map(|_| fastrand::u32(0..vocab_size as u32))
        .collect();
    Tensor::from_vec(data, (batch, seq), &Device::Cpu).unwrap()
}

#[test]
fn forward_scores_every_position_against_the_vocabulary() {
    let vocab = vocabulary(&["a", "b", "c"]);
    let vocab_size = vocab.len();
    let decoder = build_decoder(vocab, test_config());

    let logits = decoder
        .forward(&features(2, 4), &random_captions(2, 5, vocab_size), false)
        .unwrap();
    assert_eq!(logits.dims(), &[2, 5, vocab_size]);
}

#[test]
fn outputs_are_independent_of_future_tokens() {
    let vocab = vocabulary(&["a", "b", "c", "d"]);
    let decoder = build_decoder(vocab, test_config());
    let feats = features(1, 4);

    // Same prefix, different suffixes from position 2 onward.
    let left = Tensor::from_vec(vec![1u32, 2, 3, 4, 5], (1, 5), &Device::Cpu).unwrap();
    let right = Tensor::from_vec(vec![1u32, 2, 5, 2, 3], (1, 5), &Device::Cpu).unwrap();

    let logits_left = decoder.forward(&feats, &left, false).unwrap();
    let logits_right = decoder.forward(&feats, &right, false).unwrap();

    let prefix_left = logits_left
        .narrow(1, 0, 2)
        .unwrap()
        .to_vec3::<f32>()
        .unwrap();
    let prefix_right = logits_right
        .narrow(1, 0, 2)
        .unwrap()
        .to_vec3::<f32>()
        .unwrap();
    assert_eq!(prefix_left, prefix_right, "future tokens leaked backwards");

    let tail_left = logits_left
        .narrow(1, 2, 3)
        .unwrap()
        .to_vec3::<f32>()
        .unwrap();
    let tail_right = logits_right
        .narrow(1, 2, 3)
        .unwrap()
        .to_vec3::<f32>()
        .unwrap();
    assert_ne!(tail_left, tail_right, "changed tokens should change scores");
}

#[test]
fn sampling_fills_the_whole_budget_with_vocabulary_ids() {
    let vocab = vocabulary(&["a", "b"]);
    let vocab_size = vocab.len() as u32;
    let decoder = build_decoder(vocab, test_config());

    let captions = decoder.sample(&features(3, 4), Some(5)).unwrap();
    assert_eq!(captions.dims(), &[3, 5]);

    let values = captions.flatten_all().unwrap().to_vec1::<u32>().unwrap();
    assert!(values.iter().all(|id| *id < vocab_size));
}

#[test]
fn each_step_writes_only_its_own_column() {
    // Step t depends only on steps before it, so shortening the budget must
    // not change the columns that remain.
    let vocab = vocabulary(&["a", "b", "c"]);
    let decoder = build_decoder(vocab, test_config());
    let feats = features(2, 4);

    let long = decoder.sample(&feats, Some(5)).unwrap();
    let short = decoder.sample(&feats, Some(3)).unwrap();

    let prefix = long.narrow(1, 0, 3).unwrap().to_vec2::<u32>().unwrap();
    assert_eq!(prefix, short.to_vec2::<u32>().unwrap());
}

#[test]
fn greedy_decoding_is_deterministic_for_fixed_weights() {
    let vocab = vocabulary(&["a", "b", "c"]);
    let decoder = build_decoder(vocab, test_config());
    let feats = features(2, 4);

    let first = decoder.sample(&feats, None).unwrap();
    let second = decoder.sample(&feats, None).unwrap();
    assert_eq!(
        first.to_vec2::<u32>().unwrap(),
        second.to_vec2::<u32>().unwrap()
    );
}

#[test]
fn minimal_decoder_scores_and_samples_from_a_zero_feature() {
    // embed_dim 8, two heads, one layer, four tokens, feature width 4.
    let vocab = vocabulary(&["a", "b"]);
    let mut config = DecoderConfig::new(4, 8, 2, 1, 3);
    config.ff_dim = 16;
    config.dropout_p = None;
    let decoder = build_decoder(vocab, config);

    let zero_feature = Tensor::zeros((1, 4), DType::F32, &Device::Cpu).unwrap();
    let start_only = Tensor::from_vec(vec![1u32], (1, 1), &Device::Cpu).unwrap();

    let logits = decoder.forward(&zero_feature, &start_only, false).unwrap();
    assert_eq!(logits.dims(), &[1, 1, 4]);

    let caption = decoder.sample(&zero_feature, None).unwrap();
    assert_eq!(caption.dims(), &[1, 3]);
    let repeat = decoder.sample(&zero_feature, None).unwrap();
    assert_eq!(
        caption.to_vec2::<u32>().unwrap(),
        repeat.to_vec2::<u32>().unwrap()
    );
}

#[test]
fn sampling_without_a_start_token_fails_fast() {
    let vocab = Vocabulary::from_tokens(vec!["<NULL>".to_string(), "a".to_string()]).unwrap();
    let decoder = build_decoder(vocab, test_config());

    let err = decoder.sample(&features(1, 4), None).unwrap_err();
    assert!(err.to_string().contains("<START>"));
}

#[test]
fn sampling_budget_is_bounded_by_max_length() {
    let vocab = vocabulary(&["a"]);
    let decoder = build_decoder(vocab, test_config());

    let err = decoder.sample(&features(1, 4), Some(7)).unwrap_err();
    assert!(err.to_string().contains("exceeds the configured max_length"));
}

#[test]
fn mismatched_batches_are_rejected() {
    let vocab = vocabulary(&["a"]);
    let vocab_size = vocab.len();
    let decoder = build_decoder(vocab, test_config());

    let err = decoder
        .forward(&features(2, 4), &random_captions(3, 4, vocab_size), false)
        .unwrap_err();
    assert!(err.to_string().contains("batch"));
}

#[test]
fn captions_beyond_max_length_are_rejected() {
    let vocab = vocabulary(&["a"]);
    let vocab_size = vocab.len();
    let decoder = build_decoder(vocab, test_config());

    let err = decoder
        .forward(&features(1, 4), &random_captions(1, 7, vocab_size), false)
        .unwrap_err();
    assert!(err.to_string().contains("positional table capacity"));
}

#[test]
fn construction_rejects_indivisible_heads() {
    let vocab = vocabulary(&["a"]);
    let mut config = test_config();
    config.embed_dim = 10;
    config.num_heads = 4;

    let device = Device::Cpu;
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    let err = TransformerDecoder::new(vocab, config, vb).unwrap_err();
    assert!(err.to_string().contains("divisible"));
}
