use std::fs;
use std::io::Read;
use std::path::Path;
use std::process::Command;

use tempfile::tempdir;
use vzip::archive::{pack_directory, PackOptions};
use vzip::codec::{get_codec, output_bound, CodecId};
use vzip::io_stream::{read_records, RecordReader};

fn ppm_frame(ordinal: usize) -> Vec<u8> {
    let (w, h) = (48usize, 32usize);
    let mut frame = format!("P6\n{w} {h}\n255\n").into_bytes();
    for y in 0..h {
        for x in 0..w {
            frame.extend_from_slice(&[(x + ordinal) as u8, (y * 4) as u8, ordinal as u8]);
        }
    }
    frame
}

fn write_frames(dir: &Path, count: usize) -> Vec<Vec<u8>> {
    (1..=count)
        .map(|i| {
            let data = ppm_frame(i);
            fs::write(dir.join(format!("{i:04}.ppm")), &data).unwrap();
            data
        })
        .collect()
}

fn options(out_dir: &Path, workers: usize) -> PackOptions {
    PackOptions {
        workers,
        output: out_dir.join("video.vzip"),
        ..PackOptions::default()
    }
}

#[test]
fn test_pack_and_roundtrip() {
    let frames_dir = tempdir().unwrap();
    let out_dir = tempdir().unwrap();
    let originals = write_frames(frames_dir.path(), 10);

    let opts = options(out_dir.path(), 8);
    let report = pack_directory(frames_dir.path(), &opts).unwrap();
    assert_eq!(report.frames, 10);
    assert_eq!(report.bytes_in, originals.iter().map(|f| f.len() as u64).sum::<u64>());
    assert!(report.bytes_out <= report.bytes_in);
    let ratio = report.ratio.unwrap();
    let expected = 100.0 * (report.bytes_in as f64 - report.bytes_out as f64) / report.bytes_in as f64;
    assert_eq!(ratio, expected);

    // Records are plain zlib streams, readable by any inflate.
    let stream = fs::read(&opts.output).unwrap();
    assert_eq!(stream.len() as u64, report.bytes_out + 4 * 10);
    let records = read_records(&stream).unwrap();
    assert_eq!(records.len(), 10);
    for (record, original) in records.iter().zip(&originals) {
        let mut raw = Vec::new();
        flate2::read::ZlibDecoder::new(&record[..]).read_to_end(&mut raw).unwrap();
        assert_eq!(&raw, original);
    }
}

#[test]
fn test_output_independent_of_worker_count() {
    let frames_dir = tempdir().unwrap();
    write_frames(frames_dir.path(), 9);

    let mut outputs = Vec::new();
    for workers in 1..=9 {
        let out_dir = tempdir().unwrap();
        let opts = options(out_dir.path(), workers);
        pack_directory(frames_dir.path(), &opts).unwrap();
        outputs.push(fs::read(&opts.output).unwrap());
    }
    assert!(outputs.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn test_zstd_roundtrip() {
    let frames_dir = tempdir().unwrap();
    let out_dir = tempdir().unwrap();
    let originals = write_frames(frames_dir.path(), 4);

    let opts = PackOptions { codec: CodecId::Zstd, ..options(out_dir.path(), 2) };
    pack_directory(frames_dir.path(), &opts).unwrap();

    let codec = get_codec(CodecId::Zstd, output_bound(opts.max_frame_size));
    let file = fs::File::open(&opts.output).unwrap();
    let decoded: Vec<Vec<u8>> = RecordReader::new(file)
        .map(|r| codec.decompress(&r.unwrap()).unwrap())
        .collect();
    assert_eq!(decoded, originals);
}

#[test]
fn test_empty_directory_writes_empty_stream() {
    let frames_dir = tempdir().unwrap();
    let out_dir = tempdir().unwrap();
    fs::write(frames_dir.path().join("notes.txt"), b"not a frame").unwrap();

    let opts = options(out_dir.path(), 8);
    let report = pack_directory(frames_dir.path(), &opts).unwrap();
    assert_eq!(report.frames, 0);
    assert_eq!(report.ratio, None);
    assert_eq!(fs::metadata(&opts.output).unwrap().len(), 0);
}

#[test]
fn test_read_failure_leaves_no_output() {
    for k in [1usize, 3, 6] {
        let frames_dir = tempdir().unwrap();
        let out_dir = tempdir().unwrap();
        write_frames(frames_dir.path(), 6);
        // A directory with a frame name passes enumeration but cannot be read.
        let broken = frames_dir.path().join(format!("{k:04}.ppm"));
        fs::remove_file(&broken).unwrap();
        fs::create_dir(&broken).unwrap();

        let opts = options(out_dir.path(), 4);
        let err = pack_directory(frames_dir.path(), &opts).unwrap_err();
        assert_eq!(err.kind(), "read", "{err}");
        assert_eq!(err.ordinal(), Some(k as u64));
        assert_eq!(fs::read_dir(out_dir.path()).unwrap().count(), 0);
    }
}

#[test]
fn test_cli_reports_and_exits_zero() {
    let frames_dir = tempdir().unwrap();
    let out_dir = tempdir().unwrap();
    write_frames(frames_dir.path(), 3);

    let output = Command::new(env!("CARGO_BIN_EXE_vzip"))
        .arg(frames_dir.path())
        .current_dir(out_dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Compression rate: "));
    assert!(stdout.contains("Time: "));
    assert_eq!(read_records(&fs::read(out_dir.path().join("video.vzip")).unwrap()).unwrap().len(), 3);
}

#[test]
fn test_cli_json_report() {
    let frames_dir = tempdir().unwrap();
    let out_dir = tempdir().unwrap();
    write_frames(frames_dir.path(), 2);

    let output = Command::new(env!("CARGO_BIN_EXE_vzip"))
        .arg(frames_dir.path())
        .args(["--json", "--workers", "2", "--output"])
        .arg(out_dir.path().join("clip.vzip"))
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["frames"], 2);
    assert!(out_dir.path().join("clip.vzip").exists());
}

#[test]
fn test_cli_missing_directory_fails() {
    let out_dir = tempdir().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_vzip"))
        .arg(out_dir.path().join("no-such-dir"))
        .current_dir(out_dir.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no-such-dir"));
    assert!(!out_dir.path().join("video.vzip").exists());
}

#[test]
fn test_cli_frame_failure_fails() {
    let frames_dir = tempdir().unwrap();
    let out_dir = tempdir().unwrap();
    write_frames(frames_dir.path(), 4);
    fs::write(frames_dir.path().join("0005.ppm"), vec![0u8; 8192]).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_vzip"))
        .arg(frames_dir.path())
        .args(["--max-frame-size", "5000"])
        .current_dir(out_dir.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("frame 5"));
    assert_eq!(fs::read_dir(out_dir.path()).unwrap().count(), 0);
}

#[test]
fn test_cli_rejects_unknown_codec() {
    let frames_dir = tempdir().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_vzip"))
        .arg(frames_dir.path())
        .args(["--codec", "lz4"])
        .current_dir(frames_dir.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
}
