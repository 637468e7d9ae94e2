use fms_core::{Foul, MatchType, Score, ScoreFields, ScoreSummary, ZONE_COUNT};

/// Deterministic scoring rules: raw alliance data plus the opponent's fouls
/// in, derived totals out. The arena treats this as a black box and never
/// performs rule arithmetic itself.
pub trait ScoreEngine: Send + Sync {
    fn summarize(&self, score: &Score, opponent_fouls: &[Foul], match_type: MatchType)
        -> ScoreSummary;

    /// The live total plus the per-zone strength metric for field lighting.
    fn score_fields(
        &self,
        score: &Score,
        opponent_fouls: &[Foul],
        match_type: MatchType,
    ) -> ScoreFields;
}

const FOUL_POINTS: i32 = 5;

/// Each zone starts with strength 2 and weakens by one per crossing, in
/// either period, bottoming out at zero.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceScoreEngine;

impl ScoreEngine for ReferenceScoreEngine {
    fn summarize(
        &self,
        score: &Score,
        opponent_fouls: &[Foul],
        _match_type: MatchType,
    ) -> ScoreSummary {
        let foul_points = opponent_fouls.len() as i32 * FOUL_POINTS;
        ScoreSummary {
            auto_points: score.auto_points,
            teleop_points: score.teleop_points,
            foul_points,
            score: score.auto_points + score.teleop_points + foul_points,
        }
    }

    fn score_fields(
        &self,
        score: &Score,
        opponent_fouls: &[Foul],
        match_type: MatchType,
    ) -> ScoreFields {
        let mut zone_strengths = [0i32; ZONE_COUNT];
        for (i, strength) in zone_strengths.iter_mut().enumerate() {
            let crossings = score.auto_zone_crossings[i] + score.teleop_zone_crossings[i];
            *strength = (2i32 - crossings as i32).max(0);
        }
        ScoreFields {
            score: self.summarize(score, opponent_fouls, match_type).score,
            zone_strengths,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fms_core::TeamId;

    #[test]
    fn test_zone_strength_weakens_with_crossings() {
        let mut score = Score::default();
        score.auto_zone_crossings[0] = 1;
        score.teleop_zone_crossings[0] = 1;
        score.teleop_zone_crossings[1] = 1;
        score.teleop_zone_crossings[2] = 5;

        let fields = ReferenceScoreEngine.score_fields(&score, &[], MatchType::Qualification);
        assert_eq!(fields.zone_strengths, [0, 1, 0, 2, 2]);
    }

    #[test]
    fn test_opponent_fouls_credit_points() {
        let score = Score {
            auto_points: 10,
            teleop_points: 25,
            ..Score::default()
        };
        let fouls = vec![Foul {
            team: TeamId::new(1),
            rule: "G22".to_string(),
            time_in_match_sec: 30.0,
        }];
        let summary = ReferenceScoreEngine.summarize(&score, &fouls, MatchType::Playoff);
        assert_eq!(summary.foul_points, 5);
        assert_eq!(summary.score, 40);
    }
}
