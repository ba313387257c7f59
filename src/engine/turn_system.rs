use super::*;

impl GameEngine {
    pub(super) fn ensure_playing(&self) -> Result<(), LifecycleError> {
        if self.phase != MatchPhase::Playing {
            return Err(LifecycleError::NotPlaying);
        }
        Ok(())
    }

    pub(super) fn ensure_turn(&self, player: usize) -> Result<(), PlacementError> {
        if player >= self.players.len() {
            return Err(PlacementError::UnknownPlayer(player));
        }
        if player != self.current_turn {
            return Err(PlacementError::NotYourTurn);
        }
        Ok(())
    }

    pub fn active_players(&self) -> Vec<usize> {
        (0..self.players.len())
            .filter(|idx| !self.disconnected.contains(idx))
            .collect()
    }

    // Moves to the next connected seat. Wrapping past the last seat closes the
    // round, as does finding nobody left to play.
    pub(super) fn advance_turn(&mut self, now_ms: u64) {
        let count = self.players.len();
        let next = (self.current_turn + 1..count).find(|idx| !self.disconnected.contains(idx));
        match next {
            Some(idx) => self.current_turn = idx,
            None => {
                self.current_turn = (0..count)
                    .find(|idx| !self.disconnected.contains(idx))
                    .unwrap_or(0);
                self.close_round();
            }
        }
        self.turn_started_at_ms = now_ms;
    }

    fn close_round(&mut self) {
        self.round += 1;
        if self.round > self.config.max_rounds {
            self.finish(GameOverReason::RoundLimit);
            return;
        }
        let threshold = self.config.win_points;
        let reached = self
            .scores
            .breakdowns
            .iter()
            .any(|score| score.active && score.total >= threshold);
        if reached {
            self.finish(GameOverReason::PointThreshold);
        }
    }

    pub(super) fn handle_timeout(&mut self, now_ms: u64) {
        let player = self.current_turn;
        let Some(state) = self.players.get_mut(player) else {
            return;
        };
        state.missed_turns += 1;
        let missed = state.missed_turns;
        warn!(
            match_id = %self.match_id,
            player,
            missed,
            "turn timed out"
        );

        if missed >= self.config.max_missed_turns {
            self.disconnect_player(player);
            if self.active_players().len() <= 1 {
                self.finish(GameOverReason::Forfeit);
                return;
            }
        }
        self.advance_turn(now_ms);
    }

    fn disconnect_player(&mut self, player: usize) {
        if !self.disconnected.insert(player) {
            return;
        }
        info!(match_id = %self.match_id, player, "player disconnected");
        self.refresh_scores();
    }

    pub(super) fn finish(&mut self, reason: GameOverReason) {
        if self.phase == MatchPhase::Finished {
            return;
        }
        let result = self.decide_result();
        info!(
            match_id = %self.match_id,
            reason = ?reason,
            result = ?result,
            round = self.round,
            "match finished"
        );
        self.phase = MatchPhase::Finished;
        self.result = Some(result);
        self.end_reason = Some(reason);
    }

    // Active players first, then by score; equal scores share a rank.
    pub fn standings(&self) -> Vec<Standing> {
        let mut ordered: Vec<&ScoreBreakdown> = self.scores.breakdowns.iter().collect();
        ordered.sort_by(|a, b| {
            b.active
                .cmp(&a.active)
                .then_with(|| b.total.cmp(&a.total))
                .then_with(|| a.player.cmp(&b.player))
        });

        let mut standings: Vec<Standing> = Vec::with_capacity(ordered.len());
        for (position, score) in ordered.into_iter().enumerate() {
            let rank = match standings.last() {
                Some(prev) if prev.score == score.total && prev.active == score.active => prev.rank,
                _ => position + 1,
            };
            let player = &self.players[score.player];
            standings.push(Standing {
                rank,
                player: score.player,
                name: player.name.clone(),
                color: player.color.clone(),
                score: score.total,
                active: score.active,
            });
        }
        standings
    }

    fn decide_result(&self) -> MatchResult {
        let active: Vec<&ScoreBreakdown> = self
            .scores
            .breakdowns
            .iter()
            .filter(|score| score.active && !self.disconnected.contains(&score.player))
            .collect();
        let Some(best) = active.iter().map(|score| score.total).max() else {
            return MatchResult::NoWinner;
        };
        let leaders: Vec<usize> = active
            .iter()
            .filter(|score| score.total == best)
            .map(|score| score.player)
            .collect();

        match leaders.as_slice() {
            [single] => {
                let player = &self.players[*single];
                MatchResult::Winner {
                    player: *single,
                    name: player.name.clone(),
                    color: player.color.clone(),
                    score: best,
                }
            }
            _ => MatchResult::Tie {
                players: leaders,
                score: best,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{free_cell, start_match};
    use super::*;

    fn options(turn_ms: u64) -> GameEngineOptions {
        GameEngineOptions {
            turn_duration_ms_override: Some(turn_ms),
            ..GameEngineOptions::default()
        }
    }

    #[test]
    fn passing_rotates_seats_and_closes_rounds() {
        let mut engine = start_match(3, GameEngineOptions::default());
        engine.pass_turn(0, 1).expect("pass");
        assert_eq!((engine.current_turn(), engine.round()), (1, 1));
        engine.pass_turn(1, 2).expect("pass");
        engine.pass_turn(2, 3).expect("pass");
        assert_eq!((engine.current_turn(), engine.round()), (0, 2));
    }

    #[test]
    fn round_limit_ends_the_match() {
        let mut engine = start_match(
            2,
            GameEngineOptions {
                max_rounds_override: Some(2),
                ..GameEngineOptions::default()
            },
        );
        for now in 0..3u64 {
            engine.pass_turn(0, now).expect("pass");
            engine.pass_turn(1, now).expect("pass");
            if engine.is_finished() {
                break;
            }
        }
        assert!(engine.is_finished());
        assert_eq!(engine.round(), 3);
        assert_eq!(engine.end_reason(), Some(GameOverReason::RoundLimit));
        assert!(engine.result().is_some());
        assert_eq!(
            engine.pass_turn(0, 10).err(),
            Some(ActionError::Lifecycle(LifecycleError::NotPlaying))
        );
    }

    #[test]
    fn threshold_is_checked_when_a_round_closes() {
        let mut engine = start_match(
            2,
            GameEngineOptions {
                win_points_override: Some(1),
                ..GameEngineOptions::default()
            },
        );
        // Sources light territory from the first refresh, so both players
        // already clear a threshold of one point.
        engine.pass_turn(0, 1).expect("pass");
        assert!(!engine.is_finished());
        engine.pass_turn(1, 2).expect("pass");
        assert!(engine.is_finished());
        assert_eq!(engine.end_reason(), Some(GameOverReason::PointThreshold));
    }

    #[test]
    fn default_threshold_is_seventy_five() {
        let mut engine = start_match(2, GameEngineOptions::default());
        assert_eq!(engine.config.win_points, 75);
        engine.scores.breakdowns[1].total = 75;
        engine.pass_turn(0, 1).expect("pass");
        engine.pass_turn(1, 2).expect("pass");
        assert_eq!(engine.end_reason(), Some(GameOverReason::PointThreshold));
        assert!(matches!(
            engine.result(),
            Some(MatchResult::Winner { player: 1, score: 75, .. })
        ));
    }

    #[test]
    fn timeout_is_strictly_after_the_deadline() {
        let mut engine = start_match(2, options(1_000));
        assert!(engine.tick_timeout_check(1_000).is_none());
        let snapshot = engine.tick_timeout_check(1_001).expect("timed out");
        assert_eq!(snapshot.current_turn, 1);
        assert_eq!(snapshot.turn_started_at_ms, 1_001);
        assert_eq!(engine.missed_turns(0), Some(1));
    }

    #[test]
    fn acting_resets_the_missed_counter() {
        let mut engine = start_match(2, options(1_000));
        engine.tick_timeout_check(1_001).expect("p0 times out");
        engine.pass_turn(1, 1_500).expect("pass");
        assert_eq!(engine.missed_turns(0), Some(1));
        let (x, y) = free_cell(&engine);
        engine
            .place_piece(0, x, y, PieceType::Blocker, 0, 1_600)
            .expect("placement");
        assert_eq!(engine.missed_turns(0), Some(0));
    }

    #[test]
    fn three_missed_turns_disconnect_and_cascade_in_four_player_match() {
        let mut engine = start_match(4, options(1_000));
        let mut now = 0;
        for _ in 0..3 {
            assert_eq!(engine.current_turn(), 0);
            now += 1_001;
            engine.tick_timeout_check(now).expect("p0 times out");
            for player in 1..4 {
                engine.pass_turn(player, now).expect("others pass");
            }
        }

        assert!(engine.disconnected().contains(&0));
        assert_eq!(engine.phase(), MatchPhase::Playing);
        assert_eq!(engine.current_turn(), 1);
        let scores = engine.scores();
        assert!(!scores[0].active);
        assert_eq!(scores[0].total, 0);
        assert!(engine.build_snapshot(None).players[0].disconnected);
        assert!(engine
            .build_snapshot(None)
            .light_sources
            .iter()
            .filter(|source| source.player == 0)
            .count()
            > 0);
        assert!(engine
            .build_snapshot(None)
            .beams
            .iter()
            .all(|segment| segment.player != 0));
        assert!(engine.territory().controlled_cells(0).next().is_none());

        // Player 1 is now first in rotation; the round wraps past seat 0.
        engine.pass_turn(1, now).expect("pass");
        engine.pass_turn(2, now).expect("pass");
        let round = engine.round();
        engine.pass_turn(3, now).expect("pass");
        assert_eq!(engine.current_turn(), 1);
        assert_eq!(engine.round(), round + 1);
    }

    #[test]
    fn two_player_disconnect_forces_end_with_remaining_winner() {
        let mut engine = start_match(2, options(1_000));
        let mut now = 0;
        for _ in 0..3 {
            now += 1_001;
            engine.tick_timeout_check(now).expect("p0 times out");
            if engine.is_finished() {
                break;
            }
            engine.pass_turn(1, now).expect("p1 passes");
        }
        assert!(engine.is_finished());
        assert_eq!(engine.end_reason(), Some(GameOverReason::Forfeit));
        assert!(matches!(
            engine.result(),
            Some(MatchResult::Winner { player: 1, .. })
        ));
        assert!(engine.tick_timeout_check(now + 10_000).is_none());
    }

    #[test]
    fn tied_leaders_produce_a_tie() {
        let mut engine = start_match(3, GameEngineOptions::default());
        for (idx, score) in engine.scores.breakdowns.iter_mut().enumerate() {
            score.total = if idx == 2 { 5 } else { 30 };
        }
        assert_eq!(
            engine.decide_result(),
            MatchResult::Tie {
                players: vec![0, 1],
                score: 30
            }
        );
    }

    #[test]
    fn standings_rank_active_players_by_score() {
        let mut engine = start_match(4, GameEngineOptions::default());
        let totals = [12, 30, 30, 50];
        for (score, total) in engine.scores.breakdowns.iter_mut().zip(totals) {
            score.total = total;
        }
        engine.scores.breakdowns[3].active = false;
        let standings = engine.standings();
        let order: Vec<(usize, usize)> = standings.iter().map(|s| (s.rank, s.player)).collect();
        assert_eq!(order, vec![(1, 1), (1, 2), (3, 0), (4, 3)]);
        assert_eq!(standings[0].name, "P2");
    }

    #[test]
    fn nobody_active_means_no_winner() {
        let mut engine = start_match(2, GameEngineOptions::default());
        engine.disconnected.extend([0, 1]);
        assert_eq!(engine.decide_result(), MatchResult::NoWinner);
    }
}
