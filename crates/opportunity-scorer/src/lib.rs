use std::collections::HashSet;

use nightscreen_core::{
    Candidate, Direction, GapDirection, GuardResult, MarketSentiment, ModelName, Opportunity,
    Prediction, Rating,
};

/// One candidate's prediction and guard annotation, the scorer's input
/// unit. Produced by zipping StockScanner/BatchPredictor/EventRiskGuard
/// output by symbol key before this phase starts (spec.md §5: "a
/// downstream phase sees a stable, ordered snapshot of its input").
pub struct ScoringInput {
    pub candidate: Candidate,
    pub prediction: Prediction,
    pub guard: GuardResult,
}

/// Ranks predictions into an ordered report. Grounded on
/// `StockScreener::create_suggestion`'s composite-score-then-sort-and-
/// truncate shape, generalized to the spec's five-term composite.
pub struct OpportunityScorer;

impl OpportunityScorer {
    pub fn rank(inputs: Vec<ScoringInput>, market: &MarketSentiment) -> Vec<Opportunity> {
        let mut opportunities: Vec<Opportunity> = inputs
            .into_iter()
            .map(|input| {
                let score = composite_score(&input.candidate, &input.prediction, &input.guard, market);
                Opportunity {
                    score,
                    rating: Rating::from_score(score),
                    candidate: input.candidate,
                    prediction: input.prediction,
                    guard: input.guard,
                }
            })
            .collect();

        opportunities.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    b.prediction
                        .final_confidence
                        .partial_cmp(&a.prediction.final_confidence)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });

        apply_sector_diversity_tiebreak(opportunities)
    }
}

fn composite_score(
    candidate: &Candidate,
    prediction: &Prediction,
    guard: &GuardResult,
    market: &MarketSentiment,
) -> f64 {
    let confidence_term = prediction.final_confidence * 0.25;
    let signal_term = signal_term(prediction);
    let technical_term = technical_term(prediction);
    let sentiment_term = guard.avg_sentiment_72h.unwrap_or(0.0).max(0.0) * 15.0;
    let alignment_term = market_alignment_term(prediction.direction, candidate.beta, market);

    (confidence_term + signal_term + technical_term + sentiment_term + alignment_term)
        .clamp(0.0, 100.0)
}

fn signal_term(prediction: &Prediction) -> f64 {
    match prediction.direction {
        Direction::Buy if prediction.final_confidence >= 80.0 => 25.0 + 5.0,
        Direction::Buy => 25.0,
        Direction::Hold => 10.0,
        Direction::Sell => 0.0,
    }
}

/// 0-20 from technical-consensus agreement strength. The composite only
/// has the technical model's renormalized contribution available at this
/// stage (OHLCV/SMA50 position lives upstream in batch-predictor), so the
/// term is driven entirely by that contribution's confidence.
fn technical_term(prediction: &Prediction) -> f64 {
    prediction
        .contributions
        .iter()
        .find(|c| c.model == ModelName::Technical)
        .map(|c| c.confidence * 20.0)
        .unwrap_or(0.0)
}

fn market_alignment_term(direction: Direction, beta: f64, market: &MarketSentiment) -> f64 {
    let agreement = match (direction, market.gap_direction) {
        (Direction::Buy, GapDirection::Up) | (Direction::Sell, GapDirection::Down) => Agreement::Aligned,
        (Direction::Buy, GapDirection::Down) | (Direction::Sell, GapDirection::Up) => Agreement::Opposed,
        _ => Agreement::Neutral,
    };

    match agreement {
        Agreement::Aligned if beta > 1.0 => 15.0,
        Agreement::Aligned => 10.0,
        Agreement::Neutral => 0.0,
        Agreement::Opposed => -5.0,
    }
}

enum Agreement {
    Aligned,
    Neutral,
    Opposed,
}

/// Ties broken by final_confidence (already applied by the primary sort),
/// then by sector diversification: within a tied group, sectors not yet
/// represented earlier in the ranking are preferred.
fn apply_sector_diversity_tiebreak(items: Vec<Opportunity>) -> Vec<Opportunity> {
    let mut result = Vec::with_capacity(items.len());
    let mut seen_sectors: HashSet<nightscreen_core::Sector> = HashSet::new();
    let mut i = 0;
    while i < items.len() {
        let mut j = i + 1;
        while j < items.len()
            && (items[j].score - items[i].score).abs() < 1e-9
            && (items[j].prediction.final_confidence - items[i].prediction.final_confidence).abs() < 1e-9
        {
            j += 1;
        }

        let mut group: Vec<Opportunity> = items[i..j].to_vec();
        group.sort_by_key(|o| seen_sectors.contains(&o.candidate.sector));
        for o in &group {
            seen_sectors.insert(o.candidate.sector);
        }
        result.extend(group);
        i = j;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use nightscreen_core::{GapConfidence, ModelContribution, OverallSentiment, Sector};

    fn market(gap: GapDirection) -> MarketSentiment {
        MarketSentiment {
            spi_change_pct: 0.5,
            sp500_change_pct: Some(0.5),
            nasdaq_change_pct: Some(0.5),
            dow_change_pct: Some(0.5),
            gap_direction: gap,
            gap_confidence: GapConfidence::High,
            overall_sentiment: OverallSentiment::Bullish,
            sentiment_score: 70.0,
        }
    }

    fn candidate(symbol: &str, sector: Sector, beta: f64) -> Candidate {
        Candidate {
            symbol: symbol.to_string(),
            sector,
            name: symbol.to_string(),
            price: 10.0,
            avg_volume: 1_000_000,
            volatility: 0.2,
            beta,
            screening_score: 70.0,
        }
    }

    fn prediction(direction: Direction, final_confidence: f64) -> Prediction {
        Prediction {
            direction,
            confidence: final_confidence,
            expected_change_pct: 0.01,
            contributions: vec![ModelContribution {
                model: ModelName::Technical,
                direction,
                confidence: 0.75,
                weight: 0.15,
            }],
            volume_adjustment: 0.0,
            event_adjustment: 0.0,
            final_confidence,
        }
    }

    #[test]
    fn clean_buy_candidate_scores_a_plus_band() {
        let mut guard = GuardResult::clean("CSL.AX");
        guard.avg_sentiment_72h = Some(0.42);
        let input = ScoringInput {
            candidate: candidate("CSL.AX", Sector::Healthcare, 1.2),
            prediction: prediction(Direction::Buy, 85.0),
            guard,
        };
        let ranked = OpportunityScorer::rank(vec![input], &market(GapDirection::Up));
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].rating, Rating::APlus);
    }

    #[test]
    fn rating_always_matches_score_band() {
        let cases = [(10.0, Rating::C), (60.0, Rating::B), (90.0, Rating::APlus)];
        for (score, expected) in cases {
            assert_eq!(Rating::from_score(score), expected);
        }
    }

    #[test]
    fn opposed_direction_penalizes_alignment_term() {
        let guard = GuardResult::clean("AAA.AX");
        let up_input = ScoringInput {
            candidate: candidate("AAA.AX", Sector::Financials, 1.2),
            prediction: prediction(Direction::Sell, 60.0),
            guard: guard.clone(),
        };
        let ranked = OpportunityScorer::rank(vec![up_input], &market(GapDirection::Up));
        assert!(ranked[0].score < 60.0);
    }

    #[test]
    fn ties_prefer_sector_not_yet_represented() {
        let guard = GuardResult::clean("X");
        let a = ScoringInput {
            candidate: candidate("AAA.AX", Sector::Financials, 1.0),
            prediction: prediction(Direction::Hold, 60.0),
            guard: guard.clone(),
        };
        let b = ScoringInput {
            candidate: candidate("BBB.AX", Sector::Financials, 1.0),
            prediction: prediction(Direction::Hold, 60.0),
            guard: guard.clone(),
        };
        let c = ScoringInput {
            candidate: candidate("CCC.AX", Sector::Materials, 1.0),
            prediction: prediction(Direction::Hold, 60.0),
            guard,
        };
        let ranked = OpportunityScorer::rank(vec![a, b, c], &market(GapDirection::Flat));
        // All three tie on score/confidence; Materials should not be pushed
        // behind both Financials entries.
        let materials_idx = ranked.iter().position(|o| o.candidate.sector == Sector::Materials).unwrap();
        assert!(materials_idx <= 1);
    }
}
