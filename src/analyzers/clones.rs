//! Copy-paste clone detection: MinHash-LSH candidates, NCD confirmation
//!
//! Two-phase matching keeps the pair space tractable: banded MinHash over
//! token shingles proposes candidates, a size pre-filter drops hopeless
//! pairs, and normalized compression distance confirms. The NCD corpus is
//! the token-hash stream, so this stage never re-reads files.

use std::io::Write;

use flate2::write::DeflateEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analyzers::Analyzer;
use crate::config::InsightConfig;
use crate::error::Result;
use crate::store::{slots, Store};

/// Shingle width in tokens
const SHINGLE_K: usize = 5;
/// MinHash signature width
const NUM_HASHES: usize = 64;
/// LSH banding: 8 bands of 8 rows
const BANDS: usize = 8;
const ROWS: usize = NUM_HASHES / BANDS;
/// Files below this token count never participate
const MIN_TOKENS: usize = 50;
/// Candidate pairs must have token counts within this relative tolerance
const SIZE_TOLERANCE: f64 = 0.30;
/// NCD below this confirms a clone pair
const NCD_THRESHOLD: f64 = 0.30;
/// Hard cap on emitted pairs
const MAX_PAIRS: usize = 500;

/// One confirmed clone pair; paths are ordered (a < b)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClonePair {
    pub a: String,
    pub b: String,
    /// MinHash Jaccard estimate
    pub similarity: f64,
    /// Normalized compression distance
    pub ncd: f64,
}

/// Clone detection output
#[derive(Debug, Clone, Default)]
pub struct CloneFacts {
    pub pairs: Vec<ClonePair>,
    /// True when fewer than two files were eligible and detection was
    /// skipped rather than errored
    pub skipped: bool,
    pub candidates_checked: usize,
}

impl CloneFacts {
    pub fn pair_count_for(&self, path: &str) -> usize {
        self.pairs.iter().filter(|p| p.a == path || p.b == path).count()
    }
}

pub struct CloneAnalyzer;

impl Analyzer for CloneAnalyzer {
    fn name(&self) -> &'static str {
        "clones"
    }

    fn requires(&self) -> &'static [&'static str] {
        &[slots::FILE_METRICS]
    }

    fn provides(&self) -> &'static [&'static str] {
        &[slots::CLONES]
    }

    fn run(&self, store: &Store, _config: &InsightConfig) -> Result<()> {
        let Some(files) = store.file_metrics.get() else { return Ok(()) };

        let eligible: Vec<(&str, &[u32])> = files
            .iter()
            .filter(|f| f.metrics.token_hashes.len() >= MIN_TOKENS)
            .map(|f| (f.metrics.path.as_str(), f.metrics.token_hashes.as_slice()))
            .collect();

        if eligible.len() < 2 {
            info!(eligible = eligible.len(), "too few eligible files, skipping clone detection");
            store.clones.set(slots::CLONES, CloneFacts { skipped: true, ..Default::default() });
            return Ok(());
        }

        let signatures: Vec<MinHashSignature> =
            eligible.iter().map(|(_, tokens)| MinHashSignature::from_tokens(tokens)).collect();

        let candidates = lsh_candidates(&signatures);
        let candidates_checked = candidates.len();

        let mut pairs = Vec::new();
        for (i, j) in candidates {
            let (path_a, tokens_a) = eligible[i];
            let (path_b, tokens_b) = eligible[j];

            // Size pre-filter
            let (small, large) =
                (tokens_a.len().min(tokens_b.len()), tokens_a.len().max(tokens_b.len()));
            if (small as f64) < (large as f64) * (1.0 - SIZE_TOLERANCE) {
                continue;
            }

            let ncd = normalized_compression_distance(tokens_a, tokens_b);
            if ncd < NCD_THRESHOLD {
                let similarity = signatures[i].jaccard_estimate(&signatures[j]);
                let (a, b) = if path_a <= path_b { (path_a, path_b) } else { (path_b, path_a) };
                pairs.push(ClonePair { a: a.to_string(), b: b.to_string(), similarity, ncd });
            }
        }

        pairs.sort_by(|x, y| {
            ordered_float::OrderedFloat(x.ncd)
                .cmp(&ordered_float::OrderedFloat(y.ncd))
                .then_with(|| (x.a.as_str(), x.b.as_str()).cmp(&(y.a.as_str(), y.b.as_str())))
        });
        pairs.truncate(MAX_PAIRS);

        debug!(candidates = candidates_checked, confirmed = pairs.len(), "clone detection complete");
        store
            .clones
            .set(slots::CLONES, CloneFacts { pairs, skipped: false, candidates_checked });
        Ok(())
    }
}

/// MinHash signature over token shingles
struct MinHashSignature {
    hashes: [u64; NUM_HASHES],
}

impl MinHashSignature {
    fn from_tokens(tokens: &[u32]) -> Self {
        let mut signature = [u64::MAX; NUM_HASHES];
        let shingles = shingle(tokens);
        for shingle in shingles {
            for (i, slot) in signature.iter_mut().enumerate() {
                let h = hash_with_seed(shingle, i as u64);
                if h < *slot {
                    *slot = h;
                }
            }
        }
        Self { hashes: signature }
    }

    fn jaccard_estimate(&self, other: &Self) -> f64 {
        let matches =
            self.hashes.iter().zip(&other.hashes).filter(|(a, b)| a == b).count();
        matches as f64 / NUM_HASHES as f64
    }

    fn band_key(&self, band: usize) -> u64 {
        let mut acc = 0xcbf29ce484222325u64;
        for &h in &self.hashes[band * ROWS..(band + 1) * ROWS] {
            acc ^= h;
            acc = acc.wrapping_mul(0x100000001b3);
        }
        acc
    }
}

fn shingle(tokens: &[u32]) -> Vec<u64> {
    if tokens.len() < SHINGLE_K {
        return vec![mix_window(tokens)];
    }
    tokens.windows(SHINGLE_K).map(mix_window).collect()
}

fn mix_window(window: &[u32]) -> u64 {
    let mut acc = 0xcbf29ce484222325u64;
    for &t in window {
        acc ^= t as u64;
        acc = acc.wrapping_mul(0x100000001b3);
    }
    acc
}

/// Seeded FNV-1a variant simulating an independent hash family
fn hash_with_seed(value: u64, seed: u64) -> u64 {
    const FNV_OFFSET: u64 = 14695981039346656037;
    const FNV_PRIME: u64 = 1099511628211;
    let mut hash = FNV_OFFSET ^ seed.wrapping_mul(0x9E3779B97F4A7C15);
    hash = (hash ^ value).wrapping_mul(FNV_PRIME);
    hash ^= hash >> 29;
    hash
}

/// Banded LSH: pairs sharing any band bucket become candidates.
/// Returned pairs are (i, j) with i < j, sorted and deduplicated.
fn lsh_candidates(signatures: &[MinHashSignature]) -> Vec<(usize, usize)> {
    let mut candidates = Vec::new();
    for band in 0..BANDS {
        let mut buckets: ahash::AHashMap<u64, Vec<usize>> = ahash::AHashMap::new();
        for (idx, signature) in signatures.iter().enumerate() {
            buckets.entry(signature.band_key(band)).or_default().push(idx);
        }
        for bucket in buckets.values() {
            for (pos, &i) in bucket.iter().enumerate() {
                for &j in &bucket[pos + 1..] {
                    candidates.push((i.min(j), i.max(j)));
                }
            }
        }
    }
    candidates.sort_unstable();
    candidates.dedup();
    candidates
}

fn deflate_len(bytes: &[u8]) -> usize {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::fast());
    if encoder.write_all(bytes).is_err() {
        return bytes.len();
    }
    encoder.finish().map(|v| v.len()).unwrap_or(bytes.len())
}

fn tokens_as_bytes(tokens: &[u32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(tokens.len() * 4);
    for t in tokens {
        bytes.extend_from_slice(&t.to_le_bytes());
    }
    bytes
}

/// NCD(x, y) = (C(xy) - min(C(x), C(y))) / max(C(x), C(y))
pub fn normalized_compression_distance(a: &[u32], b: &[u32]) -> f64 {
    let bytes_a = tokens_as_bytes(a);
    let bytes_b = tokens_as_bytes(b);
    let mut joined = bytes_a.clone();
    joined.extend_from_slice(&bytes_b);

    let ca = deflate_len(&bytes_a) as f64;
    let cb = deflate_len(&bytes_b) as f64;
    let cab = deflate_len(&joined) as f64;

    let max = ca.max(cb);
    if max == 0.0 {
        return 0.0;
    }
    ((cab - ca.min(cb)) / max).clamp(0.0, 1.0)
}
