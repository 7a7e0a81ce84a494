use criterion::{criterion_group, criterion_main, Criterion};
use spatialdb::blob::{BlobFormat, GeometryBlobWriter};
use spatialdb::io::wkb::{read_geometry, WkbFlavor, WkbWriter};
use spatialdb::io::wkt::{read_wkt, Locale, WktWriter};

/// A polygon with one ring of `n` vertices on a circle.
fn ring_wkt(n: usize) -> String {
    let vertices = (0..=n)
        .map(|i| {
            let angle = (i % n) as f64 / n as f64 * std::f64::consts::TAU;
            format!("{} {}", 116.4 + angle.cos(), 39.9 + angle.sin())
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("POLYGON (({vertices}))")
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let wkt = ring_wkt(10_000);

    let mut writer = WkbWriter::new(WkbFlavor::Iso);
    read_wkt(&wkt, &Locale::C, &mut writer).unwrap();
    let wkb = writer.finish().unwrap();

    c.bench_function("parse WKT to WKB", |b| {
        b.iter(|| {
            let mut writer = WkbWriter::new(WkbFlavor::Iso);
            read_wkt(&wkt, &Locale::C, &mut writer).unwrap();
            writer.finish().unwrap()
        })
    });
    c.bench_function("write WKB as WKT", |b| {
        b.iter(|| {
            let mut writer = WktWriter::new(Locale::C);
            read_geometry(&wkb, &mut writer).unwrap();
            writer.finish().unwrap()
        })
    });

    for format in [BlobFormat::GeoPackage, BlobFormat::Spatialite] {
        c.bench_function(&format!("encode WKB as {format:?} blob"), |b| {
            b.iter(|| {
                let mut writer = GeometryBlobWriter::new(format, 4326);
                read_geometry(&wkb, &mut writer).unwrap();
                writer.finish().unwrap()
            })
        });

        let blob = {
            let mut writer = GeometryBlobWriter::new(format, 4326);
            read_geometry(&wkb, &mut writer).unwrap();
            writer.finish().unwrap()
        };
        c.bench_function(&format!("scan {format:?} blob envelope"), |b| {
            b.iter(|| {
                let mut header = format.read_header(&blob).unwrap();
                format.fill_envelope(&blob, &mut header).unwrap();
                header
            })
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
