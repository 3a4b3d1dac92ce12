//! Performance benchmarks for the findex query and index paths.
//!
//! **Benchmarks included:**
//! - `name_search`: indexed name search latency at 100, 1000, and 10000 rows
//! - `image_query`: image listing, capped and paginated, over 5000 mixed rows
//! - `database_insert`: batched upsert throughput (10, 100, 500 rows per batch)
//! - `tree_scan`: live parallel scan of a generated 1000-file tree
//! - `classification`: extension-to-category and extension-to-MIME lookups
//!
//! **Run benchmarks:**
//! ```bash
//! cargo bench                          # Run all benchmarks
//! cargo bench -- name_search           # Name search only
//! cargo bench -- --baseline before     # Compare to a saved baseline
//! ```
//!
//! **Notes:**
//! - Database benchmarks use a file-backed store in a TempDir, matching the
//!   WAL configuration used in production
//! - `tree_scan` measures warm-cache walks; first-touch IO is setup
//! - Sample size is 10 with 5 seconds of measurement per benchmark

use std::fs;

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use findex::classify::{content_type_for_extension, FileCategory};
use findex::scan::{parallel_scan, ScanFilter};
use findex::storage::{
    find_images, find_images_page, init_storage, search_files, search_files_page, upsert_files,
    Database,
};
use findex::FileRecord;
use tempfile::TempDir;

fn create_benchmark_db() -> (TempDir, Database) {
    let tmpdir = TempDir::new().expect("failed to create temp dir");
    let db = Database::open(tmpdir.path().join("bench.db")).expect("failed to open database");
    init_storage(&db).expect("failed to initialize storage");
    (tmpdir, db)
}

/// Synthetic record. Categories cycle so image queries hit a stable fraction
/// of the rows.
fn test_record(i: usize) -> FileRecord {
    let (ext, category) = match i % 4 {
        0 => ("txt", FileCategory::Document),
        1 => ("jpg", FileCategory::Image),
        2 => ("mp4", FileCategory::Video),
        _ => ("rs", FileCategory::Code),
    };
    FileRecord {
        name: format!("file_{i}.{ext}"),
        path: format!("dir_{}/file_{i}.{ext}", i % 50),
        size: 1024,
        mtime: Utc::now(),
        file_type: category,
        is_directory: false,
    }
}

fn seed_records(db: &Database, count: usize) {
    let records: Vec<FileRecord> = (0..count).map(test_record).collect();
    for batch in records.chunks(500) {
        db.with_transaction(|conn| upsert_files(conn, batch))
            .expect("seed insert failed");
    }
}

/// Benchmark: indexed name search at various row counts.
fn bench_name_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("name_search");
    group.sample_size(10);
    group.measurement_time(std::time::Duration::from_secs(5));

    for count in &[100usize, 1000, 10000] {
        let (_tmpdir, db) = create_benchmark_db();
        seed_records(&db, *count);

        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, _| {
            b.iter(|| {
                db.with_conn(|conn| {
                    let results = black_box(search_files(conn, "file_1", "")?);
                    black_box(results.len());
                    Ok(())
                })
                .expect("search failed");
            });
        });

        group.bench_with_input(BenchmarkId::new("paginated", count), count, |b, _| {
            b.iter(|| {
                db.with_conn(|conn| {
                    let page = black_box(search_files_page(conn, "file_1", "", 2, 50)?);
                    black_box(page.total);
                    Ok(())
                })
                .expect("paginated search failed");
            });
        });
    }

    group.finish();
}

/// Benchmark: image listing over a mixed index.
fn bench_image_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("image_query");
    group.sample_size(10);
    group.measurement_time(std::time::Duration::from_secs(5));

    let (_tmpdir, db) = create_benchmark_db();
    seed_records(&db, 5000);

    group.bench_function("capped_5000_rows", |b| {
        b.iter(|| {
            db.with_conn(|conn| {
                let images = black_box(find_images(conn, "")?);
                black_box(images.len());
                Ok(())
            })
            .expect("image query failed");
        });
    });

    group.bench_function("page_of_100", |b| {
        b.iter(|| {
            db.with_conn(|conn| {
                let page = black_box(find_images_page(conn, "", 3, 100)?);
                black_box(page.has_more);
                Ok(())
            })
            .expect("image page query failed");
        });
    });

    group.finish();
}

/// Benchmark: batched upsert throughput, the persistence path of an index
/// build.
fn bench_database_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("database_insert");
    group.sample_size(10);
    group.measurement_time(std::time::Duration::from_secs(5));

    for batch_size in &[10usize, 100, 500] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{batch_size}_rows")),
            batch_size,
            |b, &batch_size| {
                b.iter_batched(
                    || {
                        let records: Vec<FileRecord> = (0..batch_size).map(test_record).collect();
                        (create_benchmark_db(), records)
                    },
                    |((_tmpdir, db), records)| {
                        db.with_transaction(|conn| {
                            let written = black_box(upsert_files(conn, &records)?);
                            black_box(written);
                            Ok(())
                        })
                        .expect("batch insert failed");
                    },
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

/// Benchmark: live parallel scan of a generated tree (20 directories, 50
/// files each).
fn bench_tree_scan(c: &mut Criterion) {
    let tmpdir = TempDir::new().expect("failed to create temp dir");
    for d in 0..20 {
        let dir = tmpdir.path().join(format!("dir_{d}"));
        fs::create_dir(&dir).expect("failed to create dir");
        for f in 0..50 {
            let ext = if f % 3 == 0 { "jpg" } else { "txt" };
            fs::write(dir.join(format!("file_{f}.{ext}")), "x").expect("failed to write file");
        }
    }

    let mut group = c.benchmark_group("tree_scan");
    group.sample_size(10);
    group.measurement_time(std::time::Duration::from_secs(5));

    group.bench_function("all_1000_files", |b| {
        b.iter(|| {
            let records = parallel_scan(tmpdir.path(), &ScanFilter::All).expect("scan failed");
            black_box(records.len());
        });
    });

    group.bench_function("images_only", |b| {
        b.iter(|| {
            let records = parallel_scan(tmpdir.path(), &ScanFilter::Images).expect("scan failed");
            black_box(records.len());
        });
    });

    group.bench_function("name_filtered", |b| {
        b.iter(|| {
            let records = parallel_scan(tmpdir.path(), &ScanFilter::name_contains("file_4"))
                .expect("scan failed");
            black_box(records.len());
        });
    });

    group.finish();
}

/// Benchmark: pure classification lookups on the listing hot path.
fn bench_classification(c: &mut Criterion) {
    let mut group = c.benchmark_group("classification");
    group.sample_size(10);
    group.measurement_time(std::time::Duration::from_secs(5));

    let extensions = [
        "jpg", "png", "mp4", "mkv", "mp3", "txt", "md", "zip", "rs", "py", "cbz", "pdf", "epub",
        "xyz", "",
    ];

    group.bench_function("category_lookup", |b| {
        b.iter(|| {
            for ext in &extensions {
                black_box(FileCategory::from_extension(ext));
            }
        });
    });

    group.bench_function("content_type_lookup", |b| {
        b.iter(|| {
            for ext in &extensions {
                black_box(content_type_for_extension(ext));
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_name_search,
    bench_image_query,
    bench_database_insert,
    bench_tree_scan,
    bench_classification,
);

criterion_main!(benches);
