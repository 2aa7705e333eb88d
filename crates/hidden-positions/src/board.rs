//! The single mutable position a walk operates on.
//!
//! Move generation, attack queries and FEN handling come from `shakmaty`.
//! [`Board`] adds the undo stack, repetition history and the
//! [`MoveGuard`] scope that makes every applied move revert on drop.

use std::ops::{Deref, DerefMut};

use shakmaty::fen::Fen;
use shakmaty::{Bitboard, CastlingMode, Chess, Color, EnPassantMode, Move, Position, Role, Square};

use crate::error::MinerError;

/// Half-moves without capture or pawn move that end the game.
const SEVENTY_FIVE_MOVE_HALFMOVES: u32 = 150;
/// Occurrences of one position that end the game.
const FIVEFOLD: usize = 5;

/// Material value of a piece, pawn = 1. Kings don't count.
pub fn piece_value(role: Role) -> i32 {
    match role {
        Role::Pawn => 1,
        Role::Knight | Role::Bishop => 3,
        Role::Rook => 5,
        Role::Queen => 9,
        Role::King => 0,
    }
}

/// Chess position with apply/undo history.
#[derive(Debug, Clone)]
pub struct Board {
    pos: Chess,
    /// Positions before each applied move, most recent last.
    undo: Vec<Chess>,
    /// Repetition keys of every position since the root, current last.
    keys: Vec<String>,
}

impl Board {
    /// Parses a FEN string.
    ///
    /// # Errors
    ///
    /// [`MinerError::InvalidFen`] if the string is malformed or describes an
    /// illegal position.
    pub fn from_fen(fen: &str) -> Result<Self, MinerError> {
        let invalid = |reason: String| MinerError::InvalidFen {
            fen: fen.to_string(),
            reason,
        };
        let parsed: Fen = fen.trim().parse().map_err(|e| invalid(format!("{}", e)))?;
        let pos: Chess = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|e| invalid(format!("{}", e)))?;
        if ply_of(&pos).is_none() {
            return Err(invalid("fullmove counter out of range".to_string()));
        }
        Ok(Self::from_position(pos))
    }

    pub fn from_position(pos: Chess) -> Self {
        let key = repetition_key(&pos);
        Self {
            pos,
            undo: Vec::new(),
            keys: vec![key],
        }
    }

    /// The underlying `shakmaty` position.
    pub fn position(&self) -> &Chess {
        &self.pos
    }

    /// Canonical FEN. The en passant square is only written when a legal
    /// en passant capture exists.
    pub fn fen(&self) -> String {
        Fen::from_position(self.pos.clone(), EnPassantMode::Legal).to_string()
    }

    /// Half-moves since the start of the game, derived from the FEN
    /// counters (`2 * (fullmove - 1)`, plus one when Black is to move).
    /// Saturates for counters too large to express.
    pub fn ply(&self) -> u32 {
        ply_of(&self.pos).unwrap_or(u32::MAX)
    }

    pub fn turn(&self) -> Color {
        self.pos.turn()
    }

    /// Number of moves applied since this board was created.
    pub fn depth(&self) -> usize {
        self.undo.len()
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        self.pos.legal_moves().into_iter().collect()
    }

    /// Legal moves that capture something, en passant included.
    pub fn captures(&self) -> Vec<Move> {
        self.pos
            .legal_moves()
            .into_iter()
            .filter(|m| m.is_capture())
            .collect()
    }

    /// Whether any piece of `color` attacks `square`.
    pub fn is_attacked_by(&self, square: Square, color: Color) -> bool {
        let board = self.pos.board();
        board.attacks_to(square, color, board.occupied()).any()
    }

    /// Squares holding `color`'s pieces of kind `role`.
    pub fn pieces(&self, role: Role, color: Color) -> Bitboard {
        let board = self.pos.board();
        board.by_role(role) & board.by_color(color)
    }

    /// Material of White minus material of Black.
    pub fn material_balance(&self) -> i32 {
        [Role::Pawn, Role::Knight, Role::Bishop, Role::Rook, Role::Queen]
            .into_iter()
            .map(|role| {
                let white = self.pieces(role, Color::White).count() as i32;
                let black = self.pieces(role, Color::Black).count() as i32;
                piece_value(role) * (white - black)
            })
            .sum()
    }

    /// Checkmate, stalemate, insufficient material, the 75-move rule or
    /// fivefold repetition.
    pub fn is_game_over(&self) -> bool {
        self.pos.is_game_over()
            || self.pos.halfmoves() >= SEVENTY_FIVE_MOVE_HALFMOVES
            || self.repetitions() >= FIVEFOLD
    }

    /// How often the current position occurred since the root, this
    /// occurrence included.
    pub fn repetitions(&self) -> usize {
        match self.keys.last() {
            Some(current) => self.keys.iter().filter(|k| *k == current).count(),
            None => 0,
        }
    }

    /// Resolves a UCI move string against the legal moves.
    pub fn parse_uci(&self, uci: &str) -> Result<Move, MinerError> {
        self.pos
            .legal_moves()
            .into_iter()
            .find(|m| m.to_uci(CastlingMode::Standard).to_string() == uci)
            .ok_or_else(|| MinerError::IllegalMove {
                mv: uci.to_string(),
                fen: self.fen(),
            })
    }

    /// Applies `mv` for the lifetime of the returned guard.
    ///
    /// # Errors
    ///
    /// [`MinerError::IllegalMove`] if `mv` is not legal here; the board is
    /// left untouched.
    pub fn play(&mut self, mv: &Move) -> Result<MoveGuard<'_>, MinerError> {
        if !self.pos.is_legal(mv) {
            return Err(MinerError::IllegalMove {
                mv: mv.to_uci(CastlingMode::Standard).to_string(),
                fen: self.fen(),
            });
        }
        self.undo.push(self.pos.clone());
        self.pos.play_unchecked(mv);
        self.keys.push(repetition_key(&self.pos));
        Ok(MoveGuard { board: self })
    }

    /// [`parse_uci`](Self::parse_uci) followed by [`play`](Self::play).
    pub fn play_uci(&mut self, uci: &str) -> Result<MoveGuard<'_>, MinerError> {
        let mv = self.parse_uci(uci)?;
        self.play(&mv)
    }

    fn undo(&mut self) {
        if let Some(previous) = self.undo.pop() {
            self.pos = previous;
            self.keys.pop();
        }
    }
}

fn ply_of(pos: &Chess) -> Option<u32> {
    (pos.fullmoves().get() - 1)
        .checked_mul(2)?
        .checked_add(u32::from(pos.turn() == Color::Black))
}

/// Placement, side to move, castling and en passant: the FEN without its
/// move counters.
fn repetition_key(pos: &Chess) -> String {
    let fen = Fen::from_position(pos.clone(), EnPassantMode::Legal).to_string();
    fen.split(' ').take(4).collect::<Vec<_>>().join(" ")
}

/// A move applied to a [`Board`], undone when the guard is dropped.
///
/// The guard dereferences to the board, so it can be queried or passed on
/// to a nested call while the move is in effect.
#[derive(Debug)]
pub struct MoveGuard<'a> {
    board: &'a mut Board,
}

impl Deref for MoveGuard<'_> {
    type Target = Board;

    fn deref(&self) -> &Board {
        self.board
    }
}

impl DerefMut for MoveGuard<'_> {
    fn deref_mut(&mut self) -> &mut Board {
        self.board
    }
}

impl Drop for MoveGuard<'_> {
    fn drop(&mut self) {
        self.board.undo();
    }
}
