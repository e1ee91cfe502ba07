//! Benchmark for LYB serialization using a synthetic device inventory.
//!
//! Builds a large list document through the builder API, then times encoding
//! and decoding with the different options.

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use lyb::codec::HashAlgorithm;
use lyb::schema::EnumMember;
use lyb::{
    DataTree, DecodeOptions, EncodeOptions, LeafType, SchemaContext, SchemaKind, TermSpec, TreeBuilder, Value,
    WithDefaults,
};
use serde::Serialize;

const MODULE: &str = "bench-inventory";

// =============================================================================
// SYNTHETIC DATA
// =============================================================================

#[derive(Debug, Serialize)]
struct Port {
    index: u16,
    speed: String,
    enabled: bool,
}

#[derive(Debug, Serialize)]
struct Device {
    serial: String,
    vendor: String,
    rack: u32,
    temperature: i64,
    enabled: bool,
    tags: Vec<String>,
    ports: Vec<Port>,
}

const VENDORS: [&str; 5] = ["acme", "globex", "initech", "umbrella", "hooli"];
const SPEEDS: [&str; 3] = ["1g", "10g", "100g"];

/// Deterministic pseudo-random sequence (xorshift).
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

fn generate(count: usize) -> Vec<Device> {
    let mut rng = Rng(0x9E37_79B9_7F4A_7C15);
    (0..count)
        .map(|i| {
            let ports = (0..rng.below(4) as u16)
                .map(|index| Port {
                    index,
                    speed: SPEEDS[rng.below(3) as usize].to_string(),
                    enabled: rng.below(4) != 0,
                })
                .collect();
            Device {
                serial: format!("SN{:08}", i),
                vendor: VENDORS[rng.below(5) as usize].to_string(),
                rack: rng.below(400) as u32,
                temperature: 18_000 + rng.below(20_000) as i64,
                enabled: rng.below(10) != 0,
                tags: (0..rng.below(3)).map(|t| format!("tag-{}", t)).collect(),
                ports,
            }
        })
        .collect()
}

// =============================================================================
// SCHEMA AND TREE
// =============================================================================

fn build_schema() -> SchemaContext {
    let mut ctx = SchemaContext::new();
    let m = ctx.add_module(MODULE, Some("2024-05-01")).expect("Failed to add module");
    let leaf = |ty| SchemaKind::Leaf(TermSpec::new(ty));

    let inventory = ctx.add_node(m, None, "inventory", SchemaKind::Container).unwrap();
    let device = ctx.add_node(m, Some(inventory), "device", SchemaKind::List).unwrap();
    ctx.add_node(m, Some(device), "serial", leaf(LeafType::String)).unwrap();
    ctx.add_node(m, Some(device), "vendor", leaf(LeafType::String)).unwrap();
    ctx.add_node(m, Some(device), "rack", leaf(LeafType::Uint32)).unwrap();
    ctx.add_node(m, Some(device), "temperature", leaf(LeafType::Decimal64 { fraction_digits: 3 }))
        .unwrap();
    let enabled = TermSpec::new(LeafType::Boolean).with_default(Value::Bool(true));
    ctx.add_node(m, Some(device), "enabled", SchemaKind::Leaf(enabled)).unwrap();
    ctx.add_node(m, Some(device), "tag", SchemaKind::LeafList(TermSpec::new(LeafType::String)))
        .unwrap();

    let port = ctx.add_node(m, Some(device), "port", SchemaKind::List).unwrap();
    ctx.add_node(m, Some(port), "index", leaf(LeafType::Uint16)).unwrap();
    let speeds = SPEEDS
        .iter()
        .enumerate()
        .map(|(i, s)| EnumMember::new(*s, i as i32))
        .collect();
    ctx.add_node(m, Some(port), "speed", leaf(LeafType::Enumeration(speeds))).unwrap();
    let port_enabled = TermSpec::new(LeafType::Boolean).with_default(Value::Bool(true));
    ctx.add_node(m, Some(port), "enabled", SchemaKind::Leaf(port_enabled)).unwrap();

    ctx.add_module("ietf-netconf-with-defaults", Some("2011-06-01"))
        .expect("Failed to add module");
    ctx
}

fn build_tree(ctx: &SchemaContext, devices: &[Device]) -> DataTree {
    TreeBuilder::new(ctx)
        .container(MODULE, "inventory", |mut inv| {
            for d in devices {
                inv = inv.list("device", |mut dev| {
                    dev = dev
                        .leaf("serial", d.serial.as_str())
                        .leaf("vendor", d.vendor.as_str())
                        .leaf("rack", d.rack)
                        .leaf("temperature", Value::Decimal64(d.temperature))
                        .leaf("enabled", d.enabled);
                    for tag in &d.tags {
                        dev = dev.leaf_list("tag", tag.as_str());
                    }
                    for p in &d.ports {
                        dev = dev.list("port", |port| {
                            port.leaf("index", p.index)
                                .leaf("speed", Value::Enum(p.speed.clone()))
                                .leaf("enabled", p.enabled)
                        });
                    }
                    dev
                });
            }
            inv
        })
        .build()
        .expect("Failed to build tree")
}

// =============================================================================
// TIMING
// =============================================================================

fn throughput(bytes: usize, time: Duration) -> f64 {
    (bytes as f64 / 1_000_000.0) / time.as_secs_f64()
}

fn time_encode(ctx: &SchemaContext, tree: &DataTree, label: &str, options: &EncodeOptions) -> (Vec<u8>, Duration) {
    let start = Instant::now();
    let encoded = lyb::encode_to_vec(ctx, tree, tree.first_root(), options).expect("Failed to encode");
    let time = start.elapsed();

    println!("\n{}: {} bytes in {:?}", label, encoded.len(), time);
    println!("  Throughput: {:.2} MB/s", throughput(encoded.len(), time));
    (encoded, time)
}

fn main() {
    let count: usize = std::env::args()
        .nth(1)
        .map(|arg| arg.parse().expect("Device count must be a number"))
        .unwrap_or(50_000);
    let output = std::env::args().nth(2);

    println!("Generating {} devices", count);
    let devices = generate(count);

    let mut ctx = build_schema();
    let convert_start = Instant::now();
    let tree = build_tree(&ctx, &devices);
    println!("Built tree of {} nodes in {:?}", tree.len(), convert_start.elapsed());

    // Benchmark encoding
    let (encoded, encode_time) = time_encode(&ctx, &tree, "Encode (explicit)", &EncodeOptions::new());
    let (tagged, _) = time_encode(
        &ctx,
        &tree,
        "Encode (all-tagged)",
        &EncodeOptions::new().defaults(WithDefaults::AllTagged),
    );
    let (xxh3, _) = time_encode(
        &ctx,
        &tree,
        "Encode (xxh3)",
        &EncodeOptions::new().hash_algorithm(HashAlgorithm::Xxh3),
    );

    ctx.precompute_hashes(HashAlgorithm::OneAtATime);
    let (cached, cached_time) = time_encode(
        &ctx,
        &tree,
        "Encode (precomputed hashes)",
        &EncodeOptions::new().cache_node_hashes(true),
    );
    println!(
        "  Speedup vs computed: {:.1}%",
        100.0 * (encode_time.as_secs_f64() - cached_time.as_secs_f64()) / encode_time.as_secs_f64()
    );
    assert_eq!(encoded, cached, "Precomputed hashes should not change the output");

    let again = lyb::encode_to_vec(&ctx, &tree, tree.first_root(), &EncodeOptions::new()).expect("Failed to encode");
    assert_eq!(encoded, again, "Encoding should be deterministic");

    // Benchmark decoding
    const DECODE_ITERS: u32 = 10;

    for _ in 0..3 {
        let _ = lyb::decode(&encoded, &ctx, &DecodeOptions::new()).expect("Failed to decode");
    }

    let decode_start = Instant::now();
    let mut decoded = None;
    for _ in 0..DECODE_ITERS {
        decoded = lyb::decode(&encoded, &ctx, &DecodeOptions::new()).expect("Failed to decode");
    }
    let decode_time = decode_start.elapsed() / DECODE_ITERS;
    let decoded = decoded.expect("Document should not be empty");

    println!("\nDecode: {:?} (avg of {} iterations)", decode_time, DECODE_ITERS);
    println!("  Throughput: {:.2} MB/s", throughput(encoded.len(), decode_time));
    assert_eq!(decoded, tree);

    let decoded_xxh3 = lyb::decode(&xxh3, &ctx, &DecodeOptions::new())
        .expect("Failed to decode")
        .expect("Document should not be empty");
    assert_eq!(decoded_xxh3, tree);

    let json = serde_json::to_vec(&devices).expect("Failed to serialize JSON");

    if let Some(path) = output {
        let path = Path::new(&path);
        fs::write(path, &encoded).expect("Failed to write .lyb file");
        println!("\n=== Output File ===");
        println!("Written: {}", path.display());
    }

    // Summary
    println!("\n=== Summary ===");
    println!("Devices: {}", devices.len());
    println!("Data nodes: {}", tree.len());
    println!(
        "JSON size: {} bytes ({:.1} MB)",
        json.len(),
        json.len() as f64 / 1_000_000.0
    );
    println!(
        "LYB size: {} bytes ({:.1} MB), {} bytes all-tagged",
        encoded.len(),
        encoded.len() as f64 / 1_000_000.0,
        tagged.len()
    );
    println!("Size vs JSON: {:.1}%", 100.0 * encoded.len() as f64 / json.len() as f64);
}
