use biomed_hub_mcp::client::{count_metadata, format_response};
use biomed_hub_mcp::repositories::ResponseCache;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::{json, Value};

fn search_page(hits: usize) -> Value {
    let results: Vec<Value> = (0..hits)
        .map(|i| json!({"primaryAccession": format!("P{i:05}"), "organism": {"taxonId": 9606}}))
        .collect();
    json!({"results": results})
}

fn bench_format_response(c: &mut Criterion) {
    let page = search_page(500);
    c.bench_function("format_response/identity", |b| {
        b.iter(|| format_response(black_box(page.clone()), None));
    });
    c.bench_function("format_response/envelope", |b| {
        b.iter(|| {
            format_response(
                black_box(page.clone()),
                Some(count_metadata("results", 500)),
            )
        });
    });
}

fn bench_request_key(c: &mut Criterion) {
    let body = serde_json::to_vec(&json!({"source": ["TP53", "MDM2"], "kind": "NEIGHBORHOOD"}))
        .unwrap_or_default();
    c.bench_function("request_key/get", |b| {
        b.iter(|| {
            ResponseCache::request_key(
                "GET",
                black_box("https://rest.uniprot.org/uniprotkb/search?query=gene%3ATP53&size=25"),
                "application/json",
                b"",
            )
        });
    });
    c.bench_function("request_key/post", |b| {
        b.iter(|| {
            ResponseCache::request_key(
                "POST",
                black_box("https://www.pathwaycommons.org/pc2/v2/graph"),
                "*/*",
                black_box(&body),
            )
        });
    });
}

criterion_group!(benches, bench_format_response, bench_request_key);
criterion_main!(benches);
