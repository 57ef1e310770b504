use candle_core::{Device, Result, Tensor};
use embedding::SinusoidalEncoding;

#[test]
fn table_values_match_the_sinusoidal_definition() -> Result<()> {
    let device = Device::Cpu;
    let embed_dim = 6;
    let encoding = SinusoidalEncoding::new(embed_dim, 4, None, &device)?;
    let table = encoding.table().flatten_all()?.to_vec1::<f32>()?;

    for pos in 0..4 {
        for pair in 0..embed_dim / 2 {
            let freq = 10000f64.powf(-((2 * pair) as f64) / embed_dim as f64);
            let angle = pos as f64 * freq;
            let sin = table[pos * embed_dim + 2 * pair];
            let cos = table[pos * embed_dim + 2 * pair + 1];
            assert!((sin as f64 - angle.sin()).abs() < 1e-6);
            assert!((cos as f64 - angle.cos()).abs() < 1e-6);
        }
    }
    Ok(())
}

#[test]
fn encoding_is_deterministic_across_instances() -> Result<()> {
    let device = Device::Cpu;
    let a = SinusoidalEncoding::new(8, 16, None, &device)?;
    let b = SinusoidalEncoding::new(8, 16, None, &device)?;

    let left = a.table().flatten_all()?.to_vec1::<f32>()?;
    let right = b.table().flatten_all()?.to_vec1::<f32>()?;
    assert_eq!(left, right);
    Ok(())
}

#[test]
fn forward_adds_the_same_signal_to_every_batch_element() -> Result<()> {
    let device = Device::Cpu;
    let encoding = SinusoidalEncoding::new(4, 8, None, &device)?;
    let zeros = Tensor::zeros((3, 5, 4), candle_core::DType::F32, &device)?;

    let out = encoding.forward(&zeros, false)?;
    let per_batch = out.to_vec3::<f32>()?;
    assert_eq!(per_batch[0], per_batch[1]);
    assert_eq!(per_batch[1], per_batch[2]);

    // Encoding zeros twice yields bit-identical results.
    let again = encoding.forward(&zeros, false)?;
    assert_eq!(again.to_vec3::<f32>()?, per_batch);
    Ok(())
}

#[test]
fn sequences_beyond_the_table_are_rejected() -> Result<()> {
    let device = Device::Cpu;
    let encoding = SinusoidalEncoding::new(4, 3, None, &device)?;
    let input = Tensor::zeros((1, 5, 4), candle_core::DType::F32, &device)?;

    let err = encoding.forward(&input, false).unwrap_err();
    assert!(err.to_string().contains("exceeds positional table capacity"));
    Ok(())
}

#[test]
fn odd_channel_counts_are_a_configuration_error() {
    let err = SinusoidalEncoding::new(5, 10, None, &Device::Cpu).unwrap_err();
    assert!(err.to_string().contains("even channel count"));
}
