use std::sync::mpsc;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::data::sample::Sample;
use crate::data::SegmentationDataset;
use crate::error::{Result, SegError};

/// Batches each worker may decode ahead of the consumer.
const PREFETCH_PER_WORKER: usize = 2;

/// Mini-batch reader over a dataset.
///
/// With `num_workers > 0`, batches are decoded ahead of time on that many
/// scoped threads while the caller trains on the current one. Worker `w`
/// owns batches `w, w + n, w + 2n, ...` and feeds its own bounded channel,
/// so the consumer can read them back in the (possibly shuffled) order.
/// `num_workers = 0` decodes every batch on the calling thread.
pub struct DataLoader<'a, D: SegmentationDataset + ?Sized> {
    dataset: &'a D,
    batch_size: usize,
    shuffle: bool,
    num_workers: usize,
}

impl<'a, D: SegmentationDataset + ?Sized> DataLoader<'a, D> {
    pub fn new(dataset: &'a D, batch_size: usize, shuffle: bool, num_workers: usize) -> Self {
        DataLoader {
            dataset,
            batch_size: batch_size.max(1),
            shuffle,
            num_workers,
        }
    }

    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    /// Runs one pass over the data, calling `f(batch_index, samples)` on the
    /// calling thread for every batch in order. The order is drawn from
    /// `rng` when shuffling is on.
    ///
    /// Stops at the first error, whether it comes from decoding or from `f`;
    /// outstanding workers are released before returning.
    pub fn for_each_batch<R, F>(&self, rng: &mut R, mut f: F) -> Result<()>
    where
        R: Rng + ?Sized,
        F: FnMut(usize, Vec<Sample>) -> Result<()>,
    {
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        if self.shuffle {
            order.shuffle(rng);
        }
        let batches: Vec<&[usize]> = order.chunks(self.batch_size).collect();

        let workers = self.num_workers.min(batches.len());
        if workers == 0 {
            for (i, indices) in batches.iter().enumerate() {
                f(i, self.load_batch(indices)?)?;
            }
            return Ok(());
        }

        std::thread::scope(|s| {
            let mut receivers = Vec::with_capacity(workers);
            for w in 0..workers {
                let (tx, rx) = mpsc::sync_channel(PREFETCH_PER_WORKER);
                let batches = &batches;
                s.spawn(move || {
                    for indices in batches.iter().skip(w).step_by(workers) {
                        // receiver gone: the consumer stopped early
                        if tx.send(self.load_batch(indices)).is_err() {
                            return;
                        }
                    }
                });
                receivers.push(rx);
            }

            for i in 0..batches.len() {
                let batch = receivers[i % workers]
                    .recv()
                    .map_err(|_| SegError::Loader(format!("worker {} exited before batch {}", i % workers, i)))??;
                f(i, batch)?;
            }
            Ok(())
        })
    }

    fn load_batch(&self, indices: &[usize]) -> Result<Vec<Sample>> {
        indices.iter().map(|&i| self.dataset.get(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::LabelMap;
    use crate::math::FeatureMap;
    use image::RgbImage;
    use rand::{rngs::StdRng, SeedableRng};
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::thread::{self, ThreadId};
    use std::time::Duration;

    /// Encodes the sample index in its first pixel and records which
    /// thread decoded it.
    struct Indexed {
        len: usize,
        delay: Duration,
        threads: Mutex<Vec<ThreadId>>,
    }

    impl Indexed {
        fn new(len: usize) -> Indexed {
            Indexed { len, delay: Duration::ZERO, threads: Mutex::new(Vec::new()) }
        }
    }

    impl SegmentationDataset for Indexed {
        fn len(&self) -> usize { self.len }
        fn n_classes(&self) -> usize { 2 }
        fn image_size(&self) -> (usize, usize) { (1, 1) }
        fn get(&self, index: usize) -> Result<Sample> {
            self.threads.lock().unwrap().push(thread::current().id());
            thread::sleep(self.delay);
            Ok(Sample {
                image: FeatureMap::from_vec(3, 1, 1, vec![index as f64, 0.0, 0.0]),
                labels: LabelMap::from_vec(1, 1, vec![0]),
            })
        }
        fn decode_segmap(&self, labels: &LabelMap) -> RgbImage {
            RgbImage::new(labels.width as u32, labels.height as u32)
        }
    }

    fn ids(batch: &[Sample]) -> Vec<usize> {
        batch.iter().map(|s| s.image.data[0] as usize).collect()
    }

    fn collect(loader: &DataLoader<'_, Indexed>, seed: u64) -> Vec<Vec<usize>> {
        let mut out = Vec::new();
        loader
            .for_each_batch(&mut StdRng::seed_from_u64(seed), |_, b| {
                out.push(ids(&b));
                Ok(())
            })
            .unwrap();
        out
    }

    #[test]
    fn last_batch_is_short() {
        let ds = Indexed::new(7);
        let loader = DataLoader::new(&ds, 3, false, 1);
        assert_eq!(loader.num_batches(), 3);
        let sizes: Vec<usize> = collect(&loader, 0).iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[test]
    fn workers_preserve_order_and_shuffle_covers_everything() {
        let ds = Indexed::new(10);
        let sequential = DataLoader::new(&ds, 4, false, 3);
        assert_eq!(collect(&sequential, 0), vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7], vec![8, 9]]);

        let shuffled = DataLoader::new(&ds, 4, true, 3);
        let mut seen: Vec<usize> = collect(&shuffled, 5).concat();
        seen.sort();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn same_seed_gives_same_order_for_any_worker_count() {
        let ds = Indexed::new(9);
        let serial = collect(&DataLoader::new(&ds, 1, true, 0), 3);
        let parallel = collect(&DataLoader::new(&ds, 1, true, 4), 3);
        assert_eq!(serial, parallel);
    }

    #[test]
    fn batch_size_one_is_decoded_off_the_calling_thread() {
        let ds = Indexed { delay: Duration::from_millis(5), ..Indexed::new(8) };
        let loader = DataLoader::new(&ds, 1, false, 4);
        let order = collect(&loader, 0);
        assert_eq!(order, (0..8).map(|i| vec![i]).collect::<Vec<_>>());

        let me = thread::current().id();
        let threads = ds.threads.lock().unwrap();
        assert_eq!(threads.len(), 8);
        assert!(threads.iter().all(|t| *t != me));
        let distinct: HashSet<_> = threads.iter().collect();
        assert!(distinct.len() > 1, "expected several loader threads");
    }

    #[test]
    fn zero_workers_decode_on_the_calling_thread() {
        let ds = Indexed::new(3);
        collect(&DataLoader::new(&ds, 1, false, 0), 0);
        let me = thread::current().id();
        assert!(ds.threads.lock().unwrap().iter().all(|t| *t == me));
    }

    #[test]
    fn consumer_error_stops_the_epoch() {
        let ds = Indexed::new(20);
        let loader = DataLoader::new(&ds, 1, false, 2);
        let mut calls = 0;
        let result = loader.for_each_batch(&mut StdRng::seed_from_u64(0), |i, _| {
            calls += 1;
            if i == 2 {
                return Err(SegError::InvalidConfig("stop".into()));
            }
            Ok(())
        });
        assert!(matches!(result, Err(SegError::InvalidConfig(_))));
        assert_eq!(calls, 3);
    }
}
