use std::collections::VecDeque;

use ahash::AHashMap;
use once_cell::sync::Lazy;
use tokio::sync::RwLock;

use crate::data_structs::responses::anomaly_report::MonitorStatus;

const ALPHABET: [char; 4] = ['a', 'b', 'c', 'd'];

// quartiles of the standard normal distribution; the alphabet is fixed at
// four letters so these are constants rather than a ppf call
const BREAKPOINTS: [f64; 4] = [
    -0.674_489_750_196_081_7,
    0.0,
    0.674_489_750_196_081_7,
    f64::INFINITY
];

// every two-letter subword over the alphabet, sorted; the bitmap is filled
// row-major from this list
static SUBWORDS: Lazy<Vec<String>> = Lazy::new(|| {
    let mut subwords = Vec::new();
    for first in ALPHABET {
        for second in ALPHABET {
            subwords.push(format!("{}{}", first, second));
        }
    }
    return subwords;
});

pub type Bitmap = [[f64; 4]; 4];

/// SAX discretization of a series: z-normalize, split into word_size equal
/// chunks, map each chunk mean to the letter of the first breakpoint above it.
fn sax_word(data: &[f64], word_size: usize) -> Result<String, String> {
    if data.is_empty() || word_size == 0 || data.len() % word_size != 0 {
        return Err(format!("series length {} is not divisible by word size {}", data.len(), word_size));
    }

    let mean = data.iter().sum::<f64>() / data.len() as f64;
    let variance = data.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / data.len() as f64;
    let std = variance.sqrt();

    let chunk_len = data.len() / word_size;
    let mut word = String::with_capacity(word_size);
    for chunk in data.chunks(chunk_len) {
        let mut chunk_mean = chunk.iter().map(|x| x - mean).sum::<f64>() / chunk.len() as f64;
        if std != 0.0 {
            chunk_mean /= std;
        }
        let letter = BREAKPOINTS.iter()
            .position(|breakpoint| *breakpoint > chunk_mean)
            .unwrap_or(ALPHABET.len() - 1);
        word.push(ALPHABET[letter]);
    }

    return Ok(word);
}

// occurrences of needle in stack, overlapping ones included
fn count_substr(stack: &str, needle: &str) -> usize {
    let stack = stack.as_bytes();
    let needle = needle.as_bytes();
    if needle.is_empty() || needle.len() > stack.len() {
        return 0;
    }

    let mut count = 0;
    for i in 0..=(stack.len() - needle.len()) {
        if &stack[i..i + needle.len()] == needle {
            count += 1;
        }
    }
    return count;
}

fn subword_frequencies(words: &[String]) -> AHashMap<String, f64> {
    let mut freqs: AHashMap<String, f64> = AHashMap::with_capacity(SUBWORDS.len());
    for subword in SUBWORDS.iter() {
        let mut total = 0.0;
        for word in words {
            total += count_substr(word, subword) as f64;
        }
        freqs.insert(subword.clone(), total);
    }
    return freqs;
}

fn build_bitmap(freqs: &AHashMap<String, f64>, norm_factor: f64) -> Bitmap {
    let mut bitmap: Bitmap = [[0.0; 4]; 4];
    for (index, subword) in SUBWORDS.iter().enumerate() {
        let value = freqs.get(subword).copied().unwrap_or(0.0);
        let row = index / ALPHABET.len();
        let col = index % ALPHABET.len();
        bitmap[row][col] = if norm_factor != 0.0 { value / norm_factor } else { value };
    }
    return bitmap;
}

fn bitmap_distance(lead: &Bitmap, lag: &Bitmap) -> f64 {
    let mut total = 0.0;
    for row in 0..ALPHABET.len() {
        for col in 0..ALPHABET.len() {
            let diff = lead[row][col] - lag[row][col];
            total += diff * diff;
        }
    }
    return total;
}

#[derive(Debug, PartialEq, Clone)]
pub struct Analysis {
    pub score: f64,
    pub lead_bitmap: Bitmap,
    pub lag_bitmap: Bitmap,
}

/// Anomaly scorer over a stream of samples: a lead window holds the current
/// behavior, a lag window the historic behavior, and the score is the
/// normalized distance between their subword-frequency bitmaps.
#[derive(Debug)]
pub struct AssumptionFreeDetector {
    word_size: usize,
    window_size: usize,
    lead_capacity: usize,
    lag_capacity: usize,
    lead_window: VecDeque<f64>,
    lag_window: VecDeque<f64>,
}

impl AssumptionFreeDetector {
    pub fn new(word_size: usize, window_factor: usize, lead_window_factor: usize, lag_window_factor: usize) -> Self {
        if word_size == 0 || window_factor == 0 || lead_window_factor == 0 || lag_window_factor == 0 {
            panic!("detector parameters must all be non-zero");
        }

        let window_size = word_size * window_factor;
        let lead_capacity = lead_window_factor * window_size;
        let lag_capacity = lag_window_factor * window_size;

        return AssumptionFreeDetector {
            word_size,
            window_size,
            lead_capacity,
            lag_capacity,
            lead_window: VecDeque::with_capacity(lead_capacity),
            lag_window: VecDeque::with_capacity(lag_capacity),
        };
    }

    /// Samples needed before the first analysis comes out.
    pub fn universe_size(&self) -> usize {
        return self.lead_capacity + self.lag_capacity;
    }

    fn window_words(window: &VecDeque<f64>, window_size: usize, word_size: usize) -> Result<Vec<String>, String> {
        let series: Vec<f64> = window.iter().copied().collect();
        let mut words = Vec::with_capacity(series.len() / window_size);
        for slice in series.chunks_exact(window_size) {
            words.push(sax_word(slice, word_size)?);
        }
        return Ok(words);
    }

    /// Feeds samples through the lead/lag windows. Once both are full, every
    /// further sample yields one analysis.
    pub fn detect(&mut self, samples: &[f64]) -> Result<Vec<Analysis>, String> {
        let mut analyses = Vec::new();

        for &sample in samples {
            if self.lead_window.len() == self.lead_capacity {
                // oldest lead sample moves to the lag window, whose own
                // oldest falls off when it is full
                if self.lag_window.len() == self.lag_capacity {
                    self.lag_window.pop_front();
                }
                if let Some(evicted) = self.lead_window.pop_front() {
                    self.lag_window.push_back(evicted);
                }
            }
            self.lead_window.push_back(sample);

            if self.lead_window.len() == self.lead_capacity && self.lag_window.len() == self.lag_capacity {
                let lead_words = Self::window_words(&self.lead_window, self.window_size, self.word_size)?;
                let lag_words = Self::window_words(&self.lag_window, self.window_size, self.word_size)?;

                let lead_freqs = subword_frequencies(&lead_words);
                let lag_freqs = subword_frequencies(&lag_words);
                let norm_factor = lead_freqs.values()
                    .chain(lag_freqs.values())
                    .fold(0.0_f64, |max, value| max.max(*value));

                let lead_bitmap = build_bitmap(&lead_freqs, norm_factor);
                let lag_bitmap = build_bitmap(&lag_freqs, norm_factor);
                let cells = (ALPHABET.len() * ALPHABET.len()) as f64;
                let score = bitmap_distance(&lead_bitmap, &lag_bitmap) / cells;

                analyses.push(Analysis { score, lead_bitmap, lag_bitmap });
            }
        }

        return Ok(analyses);
    }
}

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub word_size: usize,
    pub window_factor: usize,
    pub lead_window_factor: usize,
    pub lag_window_factor: usize,
    pub prune_idle_seconds: i64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        return MonitorSettings {
            word_size: 10,
            window_factor: 100,
            lead_window_factor: 3,
            lag_window_factor: 30,
            prune_idle_seconds: 300,
        };
    }
}

#[derive(Debug)]
struct DeviceMonitor {
    detector: AssumptionFreeDetector,
    samples_seen: u64,
    last_score: Option<f64>,
    last_seen: i64,
}

/// One detector per device id, created lazily on first ingestion.
pub struct HealthMonitorTable {
    settings: MonitorSettings,
    monitors: RwLock<AHashMap<String, DeviceMonitor>>,
}

impl HealthMonitorTable {
    pub fn new(settings: MonitorSettings) -> Self {
        return HealthMonitorTable {
            settings,
            monitors: RwLock::new(AHashMap::new()),
        };
    }

    pub async fn ingest(&self, device_id: &str, samples: &[f64], timestamp: i64) -> Result<Vec<Analysis>, String> {
        let mut monitors = self.monitors.write().await;
        let monitor = monitors.entry(device_id.to_string()).or_insert_with(|| DeviceMonitor {
            detector: AssumptionFreeDetector::new(
                self.settings.word_size,
                self.settings.window_factor,
                self.settings.lead_window_factor,
                self.settings.lag_window_factor
            ),
            samples_seen: 0,
            last_score: None,
            last_seen: timestamp,
        });

        let analyses = monitor.detector.detect(samples)?;
        monitor.samples_seen += samples.len() as u64;
        monitor.last_seen = timestamp;
        if let Some(analysis) = analyses.last() {
            monitor.last_score = Some(analysis.score);
        }

        return Ok(analyses);
    }

    pub async fn status(&self, device_id: &str) -> Option<MonitorStatus> {
        let monitors = self.monitors.read().await;
        return monitors.get(device_id).map(|monitor| MonitorStatus {
            device_id: device_id.to_string(),
            samples_seen: monitor.samples_seen,
            last_score: monitor.last_score,
            last_seen: monitor.last_seen,
        });
    }

    pub async fn remove(&self, device_id: &str) -> bool {
        return self.monitors.write().await.remove(device_id).is_some();
    }

    /// Drops monitors that have not seen a sample since the idle cutoff.
    /// Returns how many were dropped.
    pub async fn prune_idle(&self, now: i64) -> usize {
        let mut monitors = self.monitors.write().await;
        let cutoff = now - self.settings.prune_idle_seconds;
        let before = monitors.len();
        monitors.retain(|_, monitor| monitor.last_seen >= cutoff);
        return before - monitors.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_settings() -> MonitorSettings {
        MonitorSettings {
            word_size: 2,
            window_factor: 1,
            lead_window_factor: 1,
            lag_window_factor: 1,
            prune_idle_seconds: 60,
        }
    }

    #[test]
    fn sax_of_a_constant_series_is_all_c() {
        // zero deviation everywhere: the first breakpoint above 0 is the
        // third one
        assert_eq!(sax_word(&[3.0; 10], 5).unwrap(), "ccccc");
    }

    #[test]
    fn sax_of_a_step_series_maps_low_to_a_and_high_to_d() {
        let data = [0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        assert_eq!(sax_word(&data, 4).unwrap(), "aadd");
    }

    #[test]
    fn sax_rejects_lengths_not_divisible_by_the_word_size() {
        assert!(sax_word(&[1.0; 5], 2).is_err());
        assert!(sax_word(&[], 2).is_err());
    }

    #[test]
    fn substring_counts_are_overlapping() {
        assert_eq!(count_substr("aaaa", "aa"), 3);
        assert_eq!(count_substr("abab", "ba"), 1);
        assert_eq!(count_substr("ab", "abc"), 0);
    }

    #[test]
    fn subword_list_covers_the_whole_alphabet_square() {
        assert_eq!(SUBWORDS.len(), 16);
        assert_eq!(SUBWORDS.first().unwrap(), "aa");
        assert_eq!(SUBWORDS.last().unwrap(), "dd");
    }

    #[test]
    fn bitmap_cells_are_normalized_frequencies() {
        let mut freqs: AHashMap<String, f64> = AHashMap::new();
        freqs.insert("aa".to_string(), 2.0);
        freqs.insert("dd".to_string(), 4.0);

        let bitmap = build_bitmap(&freqs, 4.0);
        assert_eq!(bitmap[0][0], 0.5);
        assert_eq!(bitmap[3][3], 1.0);
        assert_eq!(bitmap[1][2], 0.0);
    }

    #[test]
    fn detector_stays_silent_until_both_windows_fill() {
        // universe is 4 samples here: analyses start with the 4th
        let mut detector = AssumptionFreeDetector::new(2, 1, 1, 1);
        assert_eq!(detector.universe_size(), 4);
        assert!(detector.detect(&[5.0, 5.0, 5.0]).unwrap().is_empty());
        assert_eq!(detector.detect(&[5.0, 5.0]).unwrap().len(), 2);
    }

    #[test]
    fn identical_lead_and_lag_behavior_scores_zero() {
        let mut detector = AssumptionFreeDetector::new(2, 1, 1, 1);
        let analyses = detector.detect(&[5.0; 10]).unwrap();
        assert_eq!(analyses.len(), 7);
        assert!(analyses.iter().all(|analysis| analysis.score == 0.0));
    }

    #[test]
    fn a_level_shift_entering_the_lead_window_scores_positive() {
        let mut detector = AssumptionFreeDetector::new(2, 1, 1, 1);
        let analyses = detector.detect(&[0.0, 0.0, 0.0, 0.0, 100.0]).unwrap();
        assert_eq!(analyses.len(), 2);
        assert_eq!(analyses[0].score, 0.0);
        // lead is now "ad" against a flat "cc" history: two unit cells differ
        assert!((analyses[1].score - 0.125).abs() < 1e-12);
    }

    #[actix_web::test]
    async fn table_creates_monitors_on_first_ingestion() {
        let table = HealthMonitorTable::new(tiny_settings());
        assert!(table.status("imu-3").await.is_none());

        let analyses = table.ingest("imu-3", &[1.0, 2.0, 3.0], 100).await.unwrap();
        assert!(analyses.is_empty());

        let status = table.status("imu-3").await.unwrap();
        assert_eq!(status.samples_seen, 3);
        assert_eq!(status.last_score, None);
        assert_eq!(status.last_seen, 100);
    }

    #[actix_web::test]
    async fn table_tracks_the_latest_score() {
        let table = HealthMonitorTable::new(tiny_settings());
        table.ingest("imu-3", &[0.0, 0.0, 0.0, 0.0, 100.0], 100).await.unwrap();

        let status = table.status("imu-3").await.unwrap();
        assert!(status.last_score.unwrap() > 0.0);
    }

    #[actix_web::test]
    async fn idle_monitors_are_pruned_and_fresh_ones_kept() {
        let table = HealthMonitorTable::new(tiny_settings());
        table.ingest("imu-3", &[1.0], 100).await.unwrap();
        table.ingest("imu-4", &[1.0], 150).await.unwrap();

        // cutoff at 101: only the monitor last seen at 100 is idle
        assert_eq!(table.prune_idle(161).await, 1);
        assert!(table.status("imu-3").await.is_none());
        assert!(table.status("imu-4").await.is_some());
    }

    #[actix_web::test]
    async fn removing_a_monitor_is_idempotent_in_effect() {
        let table = HealthMonitorTable::new(tiny_settings());
        table.ingest("imu-3", &[1.0], 100).await.unwrap();

        assert!(table.remove("imu-3").await);
        assert!(!table.remove("imu-3").await);
        assert!(table.status("imu-3").await.is_none());
    }
}
