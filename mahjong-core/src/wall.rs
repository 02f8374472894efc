//! Deterministic tile wall (spec §3, §9 determinism contract).
//!
//! Generation is seeded: the same `(seed, rng_version)` pair always shuffles
//! the same 136-tile sequence, which is what lets the orchestrator's replay
//! contract (§4.3) hold byte-for-byte.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_pcg::Pcg64;

use crate::tile::{NUM_TILES, NUM_TILE_TYPES, Tile};

/// Bumped whenever the shuffle algorithm changes, so old replays can detect
/// they were recorded against a different wall generator.
pub const RNG_VERSION: &str = "mahjong-core-wall-v1";

const DEAD_WALL_LEN: usize = 14;
const DORA_INDICATOR_POOL: usize = 5;
const URA_INDICATOR_POOL: usize = 5;
const RINSHAN_POOL: usize = 4;

#[derive(Debug, Clone)]
pub struct Wall {
    /// The live wall, drawn from `live[head]` onward.
    live: Vec<Tile>,
    head: usize,
    /// Pool of up to five dora indicators; revealed ones are the prefix
    /// `all_dora_indicators[..dora_indicators.len()]`.
    all_dora_indicators: [Tile; DORA_INDICATOR_POOL],
    dora_indicators: Vec<Tile>,
    /// Same shape for ura-dora, revealed only alongside a riichi win.
    all_ura_indicators: [Tile; URA_INDICATOR_POOL],
    ura_revealed: bool,
    rinshan_tiles: [Tile; RINSHAN_POOL],
    rinshan_drawn: usize,
    /// Indicators revealed but not yet shown to players (open/added kan
    /// defers the reveal until the replacement discard survives the ron
    /// check - see `round::emit_deferred_dora_events`).
    pending_dora_count: usize,
    kan_count: usize,
}

impl Wall {
    /// Builds a fresh, fully shuffled wall from a 64-bit seed.
    pub fn deal(seed: u64) -> Self {
        let mut rng = Pcg64::seed_from_u64(seed);
        let mut tiles: Vec<Tile> = (0..NUM_TILES as u8 / 4)
            .flat_map(|kind| (0..4).map(move |copy| Tile::new(kind * 4 + copy)))
            .collect();
        // NUM_TILES/4 == NUM_TILE_TYPES by construction; assert for clarity.
        debug_assert_eq!(tiles.len(), NUM_TILES as usize);
        debug_assert_eq!(NUM_TILES / 4, NUM_TILE_TYPES as u16);
        tiles.shuffle(&mut rng);

        let dead_wall: Vec<Tile> = tiles.split_off(tiles.len() - DEAD_WALL_LEN);
        let live = tiles;

        let mut dead_iter = dead_wall.into_iter();
        let all_dora_indicators: [Tile; DORA_INDICATOR_POOL] =
            std::array::from_fn(|_| dead_iter.next().expect("dead wall has 14 tiles"));
        let all_ura_indicators: [Tile; URA_INDICATOR_POOL] =
            std::array::from_fn(|_| dead_iter.next().expect("dead wall has 14 tiles"));
        let rinshan_tiles: [Tile; RINSHAN_POOL] =
            std::array::from_fn(|_| dead_iter.next().expect("dead wall has 14 tiles"));
        debug_assert!(dead_iter.next().is_none());

        let mut wall = Wall {
            live,
            head: 0,
            all_dora_indicators,
            dora_indicators: Vec::new(),
            all_ura_indicators,
            ura_revealed: false,
            rinshan_tiles,
            rinshan_drawn: 0,
            pending_dora_count: 0,
            kan_count: 0,
        };
        wall.dora_indicators.push(wall.all_dora_indicators[0]);
        wall
    }

    /// Tiles still available to be drawn normally. Each kan permanently
    /// removes one from this count (the live-wall tile moved to the dead
    /// wall to keep it at fourteen).
    pub fn remaining_live(&self) -> usize {
        self.live.len().saturating_sub(self.head + self.kan_count)
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_live() == 0
    }

    /// Draws the next tile from the head of the live wall.
    pub fn draw(&mut self) -> Option<Tile> {
        if self.is_exhausted() {
            return None;
        }
        let tile = self.live[self.head];
        self.head += 1;
        Some(tile)
    }

    /// Draws a replacement (rinshan) tile after any kan. Consumes one
    /// live-wall slot to keep the dead wall at fourteen tiles.
    pub fn draw_rinshan(&mut self) -> Option<Tile> {
        if self.rinshan_drawn >= RINSHAN_POOL || self.kan_count >= RINSHAN_POOL {
            return None;
        }
        let tile = self.rinshan_tiles[self.rinshan_drawn];
        self.rinshan_drawn += 1;
        self.kan_count += 1;
        Some(tile)
    }

    pub fn kan_count(&self) -> usize {
        self.kan_count
    }

    /// Reveals the next dora indicator immediately (closed kan, base deal).
    pub fn reveal_dora_now(&mut self) -> Option<Tile> {
        let next = self.dora_indicators.len();
        if next >= DORA_INDICATOR_POOL {
            return None;
        }
        let tile = self.all_dora_indicators[next];
        self.dora_indicators.push(tile);
        Some(tile)
    }

    /// Marks one dora indicator as pending (open/added kan): it exists but
    /// is not yet visible to players.
    pub fn defer_dora(&mut self) {
        self.pending_dora_count += 1;
    }

    /// Reveals all currently pending dora indicators, returning the newly
    /// visible tiles in order.
    pub fn reveal_pending_dora(&mut self) -> Vec<Tile> {
        let mut revealed = Vec::with_capacity(self.pending_dora_count);
        for _ in 0..self.pending_dora_count {
            if let Some(tile) = self.reveal_dora_now() {
                revealed.push(tile);
            }
        }
        self.pending_dora_count = 0;
        revealed
    }

    pub fn dora_indicators(&self) -> &[Tile] {
        &self.dora_indicators
    }

    pub fn pending_dora_count(&self) -> usize {
        self.pending_dora_count
    }

    /// Reveals ura-dora indicators matching the currently revealed dora
    /// indicators, for a riichi win. Idempotent.
    pub fn reveal_ura_dora(&mut self) -> Vec<Tile> {
        self.ura_revealed = true;
        self.all_ura_indicators[..self.dora_indicators.len()].to_vec()
    }

    /// Total tile accounting check, used by tests to validate conservation
    /// (spec §8 invariant: total tile count is always 136).
    pub fn accounted_tiles(&self) -> usize {
        self.live.len() + DORA_INDICATOR_POOL + URA_INDICATOR_POOL + RINSHAN_POOL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deal_is_deterministic_for_a_given_seed() {
        let a = Wall::deal(12345);
        let b = Wall::deal(12345);
        assert_eq!(a.live, b.live);
        assert_eq!(a.all_dora_indicators, b.all_dora_indicators);
    }

    #[test]
    fn different_seeds_usually_differ() {
        let a = Wall::deal(1);
        let b = Wall::deal(2);
        assert_ne!(a.live, b.live);
    }

    #[test]
    fn conserves_all_136_tiles() {
        let wall = Wall::deal(999);
        assert_eq!(wall.accounted_tiles(), NUM_TILES as usize);
    }

    #[test]
    fn four_kans_exhaust_rinshan_and_shrink_live_wall() {
        let mut wall = Wall::deal(7);
        let before = wall.remaining_live();
        for _ in 0..4 {
            assert!(wall.draw_rinshan().is_some());
        }
        assert!(wall.draw_rinshan().is_none());
        assert_eq!(wall.remaining_live(), before - 4);
    }
}
