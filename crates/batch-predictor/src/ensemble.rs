use nightscreen_core::{Direction, GuardResult, ModelContribution, ModelName, ModelVote, Prediction};

/// Fixed ensemble weights per spec.md §4.5. When a model is absent the
/// remaining weights are renormalized to 1.0, never treated as weight 0
/// against the others (§9: "the spec treats 'disabled' as
/// weight-renormalization, not as weight = 0").
pub fn base_weight(model: ModelName) -> f64 {
    match model {
        ModelName::Lstm => 0.45,
        ModelName::Trend => 0.25,
        ModelName::Technical => 0.15,
        ModelName::Sentiment => 0.15,
    }
}

/// The `ensemble.weights` run-config knob (spec.md §6): overridable base
/// weights for the four registered models, still renormalized around
/// whichever models actually voted. Defaults match [`base_weight`] exactly.
#[derive(Debug, Clone, Copy, serde::Deserialize)]
#[serde(default)]
pub struct EnsembleWeights {
    pub lstm: f64,
    pub trend: f64,
    pub technical: f64,
    pub sentiment: f64,
}

impl Default for EnsembleWeights {
    fn default() -> Self {
        Self {
            lstm: base_weight(ModelName::Lstm),
            trend: base_weight(ModelName::Trend),
            technical: base_weight(ModelName::Technical),
            sentiment: base_weight(ModelName::Sentiment),
        }
    }
}

impl EnsembleWeights {
    pub fn weight_for(&self, model: ModelName) -> f64 {
        match model {
            ModelName::Lstm => self.lstm,
            ModelName::Trend => self.trend,
            ModelName::Technical => self.technical,
            ModelName::Sentiment => self.sentiment,
        }
    }
}

fn direction_rank(direction: Direction) -> u8 {
    match direction {
        Direction::Buy => 2,
        Direction::Sell => 1,
        Direction::Hold => 0,
    }
}

/// Aggregates per-model votes into a final Prediction, applying the
/// volume and event-risk adjustments and the [50,95] confidence clamp.
pub fn aggregate(
    votes: &[(ModelName, Option<ModelVote>)],
    volume_ratio_20d: f64,
    guard: &GuardResult,
    weights: &EnsembleWeights,
) -> Prediction {
    let present: Vec<(ModelName, ModelVote)> = votes
        .iter()
        .filter_map(|(name, vote)| vote.map(|v| (*name, v)))
        .collect();

    let total_base_weight: f64 = present.iter().map(|(name, _)| weights.weight_for(*name)).sum();

    let contributions: Vec<ModelContribution> = present
        .iter()
        .map(|(name, vote)| {
            let weight = if total_base_weight > 0.0 {
                weights.weight_for(*name) / total_base_weight
            } else {
                0.0
            };
            ModelContribution {
                model: *name,
                direction: vote.direction,
                confidence: vote.confidence,
                weight,
            }
        })
        .collect();

    // Majority vote weighted by renormalized model weight, BUY > SELL > HOLD
    // tie-break (spec.md §4.5 step 2).
    let mut by_direction: std::collections::HashMap<Direction, f64> = std::collections::HashMap::new();
    for c in &contributions {
        *by_direction.entry(c.direction).or_insert(0.0) += c.weight;
    }
    let direction = by_direction
        .into_iter()
        .max_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap()
                .then(direction_rank(a.0).cmp(&direction_rank(b.0)))
        })
        .map(|(d, _)| d)
        .unwrap_or(Direction::Hold);

    let raw_confidence: f64 = contributions.iter().map(|c| c.confidence * c.weight).sum::<f64>() * 100.0;

    let volume_adjustment = if volume_ratio_20d > 1.5 {
        10.0
    } else if volume_ratio_20d < 0.5 {
        -15.0
    } else {
        0.0
    };

    // Reported alongside `volume_adjustment` so `confidence + volume_adjustment
    // + event_adjustment` reconciles to `final_confidence` in the diagnostic
    // CSV columns; the haircut itself is applied multiplicatively just below.
    let event_adjustment = -(raw_confidence * guard.weight_haircut);

    let final_confidence = (raw_confidence * (1.0 - guard.weight_haircut) + volume_adjustment)
        .clamp(50.0, 95.0);

    let direction = if guard.skip_trading { Direction::Hold } else { direction };

    let expected_change_pct = match direction {
        Direction::Buy => (final_confidence - 50.0) / 100.0,
        Direction::Sell => -(final_confidence - 50.0) / 100.0,
        Direction::Hold => 0.0,
    };

    Prediction {
        direction,
        confidence: raw_confidence.clamp(0.0, 100.0),
        expected_change_pct,
        contributions,
        volume_adjustment,
        event_adjustment,
        final_confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(d: Direction, c: f64) -> Option<ModelVote> {
        Some(ModelVote { direction: d, confidence: c })
    }

    #[test]
    fn final_confidence_always_within_50_to_95() {
        let votes = vec![
            (ModelName::Lstm, vote(Direction::Buy, 0.9)),
            (ModelName::Trend, vote(Direction::Buy, 0.8)),
            (ModelName::Technical, vote(Direction::Buy, 0.75)),
            (ModelName::Sentiment, vote(Direction::Buy, 0.85)),
        ];
        let guard = GuardResult::clean("TST.AX");
        let prediction = aggregate(&votes, 1.0, &guard, &EnsembleWeights::default());
        assert!(prediction.final_confidence >= 50.0 && prediction.final_confidence <= 95.0);
    }

    #[test]
    fn missing_model_renormalizes_remaining_weights() {
        let votes = vec![
            (ModelName::Lstm, None),
            (ModelName::Trend, vote(Direction::Buy, 0.8)),
            (ModelName::Technical, vote(Direction::Buy, 0.75)),
            (ModelName::Sentiment, None),
        ];
        let guard = GuardResult::clean("TST.AX");
        let prediction = aggregate(&votes, 1.0, &guard, &EnsembleWeights::default());
        let total_weight: f64 = prediction.contributions.iter().map(|c| c.weight).sum();
        assert!((total_weight - 1.0).abs() < 1e-9);
    }

    #[test]
    fn skip_trading_forces_hold_direction() {
        let votes = vec![
            (ModelName::Lstm, vote(Direction::Buy, 0.9)),
            (ModelName::Trend, vote(Direction::Buy, 0.8)),
        ];
        let mut guard = GuardResult::clean("TST.AX");
        guard.skip_trading = true;
        guard.weight_haircut = 0.70;
        let prediction = aggregate(&votes, 1.0, &guard, &EnsembleWeights::default());
        assert_eq!(prediction.direction, Direction::Hold);
    }

    #[test]
    fn high_volume_ratio_adds_positive_adjustment() {
        let votes = vec![(ModelName::Trend, vote(Direction::Buy, 0.8))];
        let guard = GuardResult::clean("TST.AX");
        let prediction = aggregate(&votes, 2.0, &guard, &EnsembleWeights::default());
        assert_eq!(prediction.volume_adjustment, 10.0);
    }

    #[test]
    fn reported_adjustments_reconcile_to_final_confidence_before_banding() {
        let votes = vec![
            (ModelName::Lstm, vote(Direction::Buy, 0.7)),
            (ModelName::Trend, vote(Direction::Buy, 0.6)),
        ];
        let mut guard = GuardResult::clean("TST.AX");
        guard.weight_haircut = 0.20;
        let prediction = aggregate(&votes, 1.0, &guard, &EnsembleWeights::default());
        let unbanded = prediction.confidence + prediction.volume_adjustment + prediction.event_adjustment;
        let rebanded = unbanded.clamp(50.0, 95.0);
        assert!((rebanded - prediction.final_confidence).abs() < 1e-9);
    }
}
