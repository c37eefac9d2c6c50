//! Downsample regression test
//!
//! Block-wise downsampling must match the whole-volume reference for every
//! block shape, both reclaim strategies and both store backends.

use volpyr_core::{PyramidArray, Shape3, StoreConfig, Volume};
use volpyr_test::{RegParams, hashed_volume, scratch_dir};
use volpyr_transform::{
    DownsampleOptions, ReclaimStrategy, downsample, downsample_volume, halve_shape,
};

#[test]
fn downsample_reg() {
    let mut rp = RegParams::new("downsample");

    // --- Shape law ---
    for (input, expected) in [
        (Shape3::new(100, 101, 1), Shape3::new(50, 51, 1)),
        (Shape3::new(3, 3, 3), Shape3::new(2, 2, 2)),
        (Shape3::new(1, 1, 1), Shape3::new(1, 1, 1)),
        (Shape3::new(2, 7, 64), Shape3::new(1, 4, 32)),
    ] {
        let out = halve_shape(input).expect("halve_shape");
        rp.compare_strings(out.to_string().as_bytes(), expected.to_string().as_bytes());
    }

    // --- 3x3x3 of 4 -> 2x2x2 of 4 ---
    let fours = Volume::filled(Shape3::splat(3), 4u16).expect("filled");
    let mut array = PyramidArray::from_volume(&fours, &StoreConfig::default()).expect("array");
    downsample(&mut array, &DownsampleOptions::default()).expect("downsample");
    rp.compare_volumes(
        &Volume::filled(Shape3::splat(2), 4u16).expect("filled"),
        &array.to_volume().expect("to_volume"),
    );
    rp.compare_values(1.0, array.level() as f64, 0.0);

    // --- Rounding ---
    let pair = Volume::from_data(Shape3::new(1, 1, 2), vec![2u16, 3]).expect("pair");
    let out = downsample_volume(&pair).expect("pair mean");
    rp.compare_values(2.0, out.data()[0] as f64, 0.0);
    let quad = Volume::from_data(Shape3::new(1, 2, 2), vec![1u16, 2, 2, 3]).expect("quad");
    let out = downsample_volume(&quad).expect("quad mean");
    rp.compare_values(2.0, out.data()[0] as f64, 0.0);
    let pair = Volume::from_data(Shape3::new(1, 1, 2), vec![1u16, 2]).expect("pair");
    let out = downsample_volume(&pair).expect("pair mean");
    rp.compare_values(2.0, out.data()[0] as f64, 0.0);

    // --- Block/whole equivalence ---
    let shape = Shape3::new(13, 10, 7);
    let input = hashed_volume::<u16>(shape, 42).expect("hashed");
    let mut reference = vec![input.clone()];
    for _ in 0..4 {
        let next = downsample_volume(reference.last().expect("level")).expect("reference");
        reference.push(next);
    }
    eprintln!(
        "  reference shapes: {}",
        reference
            .iter()
            .map(|v| v.shape().to_string())
            .collect::<Vec<_>>()
            .join(" -> ")
    );

    let dir = scratch_dir("downsample_reg").expect("scratch dir");
    let blocks = [
        None,
        Some(Shape3::splat(1)),
        Some(Shape3::new(2, 3, 5)),
        Some(Shape3::splat(3)),
        Some(Shape3::splat(64)),
    ];
    let mut case = 0;
    for strategy in [ReclaimStrategy::InPlace, ReclaimStrategy::DoubleBuffer] {
        for on_disk in [false, true] {
            for block in blocks {
                case += 1;
                let mut config = StoreConfig::default().with_chunk_shape(Shape3::new(4, 4, 3));
                if on_disk {
                    config = config.in_directory(dir.join(format!("case{case}")));
                }
                let mut array = PyramidArray::from_volume(&input, &config).expect("array");
                let options = DownsampleOptions {
                    block_shape: block,
                    strategy,
                };
                for level in 1..reference.len() {
                    downsample(&mut array, &options).expect("downsample");
                    rp.compare_values(level as f64, array.level() as f64, 0.0);
                    rp.compare_volumes(&reference[level], &array.to_volume().expect("to_volume"));
                }
                if on_disk {
                    rp.compare_exists(&dir.join(format!("case{case}")));
                    rp.compare_values(
                        0.0,
                        dir.join(format!("case{case}.next")).exists() as u8 as f64,
                        0.0,
                    );
                }
            }
        }
    }

    // --- Full-range values do not overflow ---
    let max = Volume::filled(Shape3::new(2, 2, 3), u32::MAX).expect("max");
    let out = downsample_volume(&max).expect("max mean");
    rp.compare_values(u32::MAX as f64, out.data()[1] as f64, 0.0);

    assert!(rp.cleanup());
}
