//! Pyramid regression test
//!
//! Builds a multi-level pyramid on disk and checks level naming, contents,
//! observation events and failure reporting.

use std::sync::Mutex;
use volpyr_core::{
    Observation, Observer, Operation, PyramidArray, Shape3, StoreConfig, Volume,
};
use volpyr_test::{RegParams, ramp_volume, scratch_dir};
use volpyr_transform::{
    DownsampleOptions, PyramidOptions, ReclaimStrategy, TransformError, build_pyramid,
    downsample_volume, level_name,
};

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<Operation>>,
}

impl Observer for Recorder {
    fn after(&self, op: &Operation, _observation: &Observation) {
        self.events.lock().unwrap().push(op.clone());
    }
}

#[test]
fn pyramid_reg() {
    let mut rp = RegParams::new("pyramid");
    let dir = scratch_dir("pyramid_reg").expect("scratch dir");

    let shape = Shape3::new(5, 40, 37);
    let input = ramp_volume::<u16>(shape).expect("ramp");
    let config = StoreConfig::default().with_chunk_shape(Shape3::new(2, 16, 16));

    for strategy in [ReclaimStrategy::InPlace, ReclaimStrategy::DoubleBuffer] {
        let out_dir = dir.join(format!("{strategy:?}"));
        let mut array = PyramidArray::from_volume(&input, &config).expect("array");
        let recorder = Recorder::default();
        let options = PyramidOptions::default()
            .with_downsample(DownsampleOptions::default().with_strategy(strategy))
            .with_persist_level0(true);
        let paths =
            build_pyramid(&mut array, 3, &out_dir, &options, &recorder).expect("build_pyramid");

        let expected_names = ["RES(5x40x37)", "RES(3x20x19)", "RES(2x10x10)", "RES(1x5x5)"];
        rp.compare_values(expected_names.len() as f64, paths.len() as f64, 0.0);
        for (path, name) in paths.iter().zip(expected_names) {
            rp.compare_strings(
                path.file_name().unwrap().to_string_lossy().as_bytes(),
                name.as_bytes(),
            );
            rp.compare_exists(&path.join(".zarray"));
        }

        // Each persisted level equals repeated whole-volume downsampling
        let mut reference = input.clone();
        for (level, path) in paths.iter().enumerate() {
            if level > 0 {
                reference = downsample_volume(&reference).expect("reference");
            }
            let loaded = PyramidArray::<u16>::load(path).expect("load level");
            rp.compare_values(level as f64, loaded.level() as f64, 0.0);
            rp.compare_volumes(&reference, &loaded.to_volume().expect("to_volume"));
        }

        // One persist for level 0, then a downsample and a persist per level
        let events = recorder.events.lock().unwrap();
        rp.compare_values(7.0, events.len() as f64, 0.0);
        let downsamples = events
            .iter()
            .filter(|op| matches!(op, Operation::Downsample { .. }))
            .count();
        rp.compare_values(3.0, downsamples as f64, 0.0);
        rp.compare_strings(
            format!("{:?}", events[1]).as_bytes(),
            format!(
                "{:?}",
                Operation::Downsample {
                    level: 1,
                    shape: Shape3::new(3, 20, 19)
                }
            )
            .as_bytes(),
        );
    }

    // Rebuilding over existing level directories replaces them
    let out_dir = dir.join("rebuild");
    for value in [1u8, 2u8] {
        let vol = Volume::filled(Shape3::new(2, 2, 2), value).expect("filled");
        let mut array = PyramidArray::from_volume(&vol, &StoreConfig::default()).expect("array");
        build_pyramid(&mut array, 1, &out_dir, &PyramidOptions::default(), &Recorder::default())
            .expect("rebuild");
    }
    let top = PyramidArray::<u8>::load(out_dir.join(level_name(Shape3::splat(1)))).expect("load");
    rp.compare_values(2.0, top.to_volume().expect("to_volume").data()[0] as f64, 0.0);

    // A blocked output location names the failing level; earlier levels stay
    let out_dir = dir.join("blocked");
    std::fs::create_dir_all(out_dir.join("RES(1x2x2)")).expect("mkdir");
    std::fs::write(out_dir.join("RES(1x2x2)").join("keep.txt"), b"x").expect("write");
    let vol = Volume::filled(Shape3::new(4, 8, 8), 3u8).expect("filled");
    let mut array = PyramidArray::from_volume(&vol, &StoreConfig::default()).expect("array");
    let err = build_pyramid(&mut array, 3, &out_dir, &PyramidOptions::default(), &Recorder::default())
        .expect_err("blocked level");
    eprintln!("  expected failure: {}", err);
    rp.compare_values(
        1.0,
        matches!(err, TransformError::Level { level: 2, .. }) as u8 as f64,
        0.0,
    );
    rp.compare_exists(&out_dir.join("RES(2x4x4)"));
    rp.compare_exists(&out_dir.join("RES(1x2x2)").join("keep.txt"));

    // Building from, or resuming at, a level directory never rewrites it
    let out_dir = dir.join("resume");
    let base = ramp_volume::<u16>(Shape3::splat(8)).expect("ramp");
    let level0_config = StoreConfig::default()
        .with_chunk_shape(Shape3::splat(4))
        .in_directory(out_dir.join("RES(8x8x8)"));
    for strategy in [ReclaimStrategy::InPlace, ReclaimStrategy::DoubleBuffer] {
        let options = PyramidOptions::default()
            .with_downsample(DownsampleOptions::default().with_strategy(strategy))
            .with_persist_level0(true);
        volpyr_core::remove_store_dir(&out_dir.join("RES(8x8x8)")).expect("clear level 0");
        let mut array = PyramidArray::from_volume(&base, &level0_config).expect("array");
        build_pyramid(&mut array, 2, &out_dir, &options, &Recorder::default()).expect("build");

        let level0 = PyramidArray::<u16>::load(out_dir.join("RES(8x8x8)")).expect("load 0");
        rp.compare_values(0.0, level0.level() as f64, 0.0);
        rp.compare_volumes(&base, &level0.to_volume().expect("to_volume"));

        let level1_path = out_dir.join("RES(4x4x4)");
        let level1 = downsample_volume(&base).expect("reference");
        let mut resumed = PyramidArray::<u16>::load(&level1_path).expect("load 1");
        build_pyramid(&mut resumed, 1, &out_dir, &PyramidOptions::default(), &Recorder::default())
            .expect("resume");
        let reloaded = PyramidArray::<u16>::load(&level1_path).expect("reload 1");
        rp.compare_values(1.0, reloaded.level() as f64, 0.0);
        rp.compare_volumes(&level1, &reloaded.to_volume().expect("to_volume"));

        let level2 = PyramidArray::<u16>::load(out_dir.join("RES(2x2x2)")).expect("load 2");
        rp.compare_values(2.0, level2.level() as f64, 0.0);
        rp.compare_volumes(
            &downsample_volume(&level1).expect("reference"),
            &level2.to_volume().expect("to_volume"),
        );
    }

    assert!(rp.cleanup());
}
