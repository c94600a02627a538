//! Top-K selection over class probability vectors.

/// The highest scoring classes of one result group, best first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopK {
    /// Class indices.
    pub label_ids: Vec<usize>,
    /// Probabilities, parallel to `label_ids`.
    pub probabilities: Vec<f32>,
}

impl TopK {
    /// Number of entries.
    pub fn len(&self) -> usize {
        self.label_ids.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.label_ids.is_empty()
    }

    /// `(label_id, probability)` pairs in rank order.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.label_ids
            .iter()
            .copied()
            .zip(self.probabilities.iter().copied())
    }
}

/// Select the `k` most probable classes.
///
/// Sorted by descending probability; equal probabilities keep the lower
/// label id first. Asking for more classes than exist returns all of them.
pub fn select_top_k(probabilities: &[f32], k: usize) -> TopK {
    let mut order: Vec<usize> = (0..probabilities.len()).collect();
    order.sort_by(|&a, &b| {
        probabilities[b]
            .total_cmp(&probabilities[a])
            .then_with(|| a.cmp(&b))
    });
    order.truncate(k);

    TopK {
        probabilities: order.iter().map(|&i| probabilities[i]).collect(),
        label_ids: order,
    }
}

/// Element-wise mean of equally long probability vectors.
#[allow(clippy::cast_precision_loss)]
pub fn average(vectors: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };

    let mut sum = vec![0.0_f32; first.len()];
    for vector in vectors {
        for (acc, p) in sum.iter_mut().zip(vector) {
            *acc += p;
        }
    }
    let n = vectors.len() as f32;
    sum.iter_mut().for_each(|acc| *acc /= n);
    sum
}
