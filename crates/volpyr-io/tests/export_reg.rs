//! Export regression test
//!
//! Writes levels as slice files, CSV, multipage TIFF and chunk
//! directories, and reads each back. Ends with a full ingest, pyramid and
//! per-level export run.

use std::fs::File;
use std::io::BufReader;
use volpyr_core::{NoopObserver, PyramidArray, Shape3, StoreConfig};
use volpyr_io::tiff::read_tiff_volume;
use volpyr_io::{
    IngestStrategy, PngCodec, SliceCodec, SliceOrder, TiffCodec, TiffCompression, discover_slices,
    export_chunked, export_csv, export_slices, export_volume_tiff, ingest_slices, shape_dir_name,
};
use volpyr_test::{RegParams, hashed_volume, ramp_volume, scratch_dir};
use volpyr_transform::{PyramidOptions, build_pyramid, downsample_volume};

#[test]
fn export_reg() {
    let mut rp = RegParams::new("export");
    let dir = scratch_dir("export_reg").expect("scratch dir");

    let shape = Shape3::new(5, 4, 6);
    let vol = ramp_volume::<u16>(shape).expect("ramp");
    let array = PyramidArray::from_volume(&vol, &StoreConfig::default()).expect("array");

    // --- Slice files are numbered 0000..0004 ---
    let slice_dir = dir.join("nested/slices");
    let written = export_slices(&array, &slice_dir, "level0", &TiffCodec::default()).expect("export");
    let names: Vec<String> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    rp.compare_strings(
        names.join(" ").as_bytes(),
        b"level0_0000.tif level0_0001.tif level0_0002.tif level0_0003.tif level0_0004.tif",
    );
    for (z, path) in written.iter().enumerate() {
        let slice: volpyr_core::Volume<u16> = TiffCodec::default().decode(path).expect("decode");
        rp.compare_volumes(&vol.slice(z as u64).expect("slice"), &slice);
    }

    // --- PNG slices round-trip ---
    let png_written = export_slices(&array, dir.join("png"), "p", &PngCodec).expect("png export");
    rp.compare_strings(
        png_written[4].file_name().unwrap().to_string_lossy().as_bytes(),
        b"p_0004.png",
    );
    let back = ingest_slices::<u16, _>(
        &png_written,
        &PngCodec,
        &StoreConfig::default(),
        IngestStrategy::IndexedWrite,
    )
    .expect("ingest png");
    rp.compare_volumes(&vol, &back.to_volume().expect("to_volume"));

    // --- CSV: one line per row ---
    let csv = export_csv(&array, dir.join("csv"), "level0").expect("csv");
    rp.compare_values(5.0, csv.len() as f64, 0.0);
    let text = std::fs::read_to_string(&csv[1]).expect("read csv");
    let lines: Vec<&str> = text.lines().collect();
    rp.compare_values(4.0, lines.len() as f64, 0.0);
    rp.compare_strings(lines[2].as_bytes(), b"10200,10201,10202,10203,10204,10205");

    // --- Multipage TIFF ---
    let tif = dir.join("stack/level0.tif");
    export_volume_tiff(&array, &tif, TiffCompression::Lzw).expect("volume tiff");
    let read = read_tiff_volume::<u16, _>(BufReader::new(File::open(&tif).expect("open")))
        .expect("read volume");
    rp.compare_volumes(&vol, &read);

    // --- Chunk directory ---
    let chunked = dir.join("chunked/level0");
    export_chunked(&array, &chunked).expect("chunked");
    let loaded = PyramidArray::<u16>::load(&chunked).expect("load");
    rp.compare_volumes(&vol, &loaded.to_volume().expect("to_volume"));

    // --- Ingest, build a pyramid, export each level ---
    let input = hashed_volume::<u16>(Shape3::new(9, 20, 17), 5).expect("hashed");
    let in_dir = dir.join("input");
    std::fs::create_dir_all(&in_dir).expect("mkdir");
    for z in 0..input.depth() {
        TiffCodec::default()
            .encode(
                &input.slice(z).expect("slice"),
                &in_dir.join(format!("img{z}.tif")),
            )
            .expect("encode");
    }
    let paths = discover_slices(&in_dir, &["tif"], SliceOrder::TrailingIndex).expect("discover");
    let config = StoreConfig::default()
        .with_chunk_shape(Shape3::splat(8))
        .in_directory(dir.join("work/level"));
    let mut array =
        ingest_slices::<u16, _>(&paths, &TiffCodec::default(), &config, IngestStrategy::LazyGraph)
            .expect("ingest");
    let levels = build_pyramid(
        &mut array,
        2,
        dir.join("pyramid"),
        &PyramidOptions::default(),
        &NoopObserver,
    )
    .expect("pyramid");
    rp.compare_values(2.0, levels.len() as f64, 0.0);

    let mut reference = input.clone();
    for level_dir in &levels {
        reference = downsample_volume(&reference).expect("reference");
        let level = PyramidArray::<u16>::load(level_dir).expect("load level");
        let out = dir.join("tif_dir").join(shape_dir_name(level.shape()));
        let files = export_slices(&level, &out, "level", &TiffCodec::default()).expect("export level");
        rp.compare_values(reference.depth() as f64, files.len() as f64, 0.0);
        let back = ingest_slices::<u16, _>(
            &files,
            &TiffCodec::default(),
            &StoreConfig::default(),
            IngestStrategy::MaterializeAll,
        )
        .expect("reingest");
        rp.compare_volumes(&reference, &back.to_volume().expect("to_volume"));
    }
    rp.compare_exists(&dir.join("tif_dir/3x5x5"));

    assert!(rp.cleanup());
}
