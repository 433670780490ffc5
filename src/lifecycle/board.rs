//! Client-side kanban board with optimistic stage moves
//!
//! A move changes the local card first, then sends exactly one stage change to
//! the server. Success leaves the card as is; failure restores the stage the
//! card had before the move. A card is either `Committed` or has one
//! `PendingMove` that remembers the prior stage, so rollback never has to
//! guess.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    models::{enums::Stage, request::RequestDetails},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardState {
    Committed,
    PendingMove { previous: Stage },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoardCard {
    pub id: i32,
    pub request_number: String,
    pub subject: String,
    pub is_overdue: bool,
    stage: Stage,
    state: CardState,
}

impl BoardCard {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn state(&self) -> CardState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, CardState::PendingMove { .. })
    }
}

impl From<RequestDetails> for BoardCard {
    fn from(request: RequestDetails) -> Self {
        Self {
            id: request.id,
            request_number: request.request_number,
            subject: request.subject,
            is_overdue: request.is_overdue,
            stage: request.stage,
            state: CardState::Committed,
        }
    }
}

/// Where a card was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget {
    /// Directly on a column, usually an empty one
    Column(Stage),
    /// On another card; its current stage is the destination
    Card(i32),
}

/// Stage-partitioned view of requests, in server listing order
#[derive(Debug, Clone, Default)]
pub struct Board {
    cards: IndexMap<i32, BoardCard>,
}

impl Board {
    pub fn new(requests: impl IntoIterator<Item = RequestDetails>) -> Self {
        let cards = requests
            .into_iter()
            .map(|r| (r.id, BoardCard::from(r)))
            .collect();
        Self { cards }
    }

    pub fn card(&self, id: i32) -> Option<&BoardCard> {
        self.cards.get(&id)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Cards currently shown in a column
    pub fn column(&self, stage: Stage) -> Vec<&BoardCard> {
        self.cards.values().filter(|c| c.stage == stage).collect()
    }

    /// Destination stage of a drop, or `None` when the target card is unknown
    pub fn resolve_drop(&self, target: DropTarget) -> Option<Stage> {
        match target {
            DropTarget::Column(stage) => Some(stage),
            DropTarget::Card(id) => self.cards.get(&id).map(|c| c.stage),
        }
    }

    /// Apply the optimistic half of a move. Returns `false` when the card is
    /// already in `destination` and nothing needs to be sent.
    pub fn begin_move(&mut self, card_id: i32, destination: Stage) -> AppResult<bool> {
        let card = self.card_mut(card_id)?;

        if card.is_pending() {
            return Err(AppError::Conflict(format!(
                "Card {} already has a move in flight",
                card.request_number
            )));
        }
        if card.stage == destination {
            return Ok(false);
        }

        card.state = CardState::PendingMove { previous: card.stage };
        card.stage = destination;
        Ok(true)
    }

    /// Server accepted the move
    pub fn commit(&mut self, card_id: i32) -> AppResult<()> {
        let card = self.card_mut(card_id)?;
        card.state = CardState::Committed;
        Ok(())
    }

    /// Server rejected the move; restores and returns the prior stage
    pub fn rollback(&mut self, card_id: i32) -> AppResult<Stage> {
        let card = self.card_mut(card_id)?;
        if let CardState::PendingMove { previous } = card.state {
            card.stage = previous;
        }
        card.state = CardState::Committed;
        Ok(card.stage)
    }

    fn card_mut(&mut self, card_id: i32) -> AppResult<&mut BoardCard> {
        self.cards
            .get_mut(&card_id)
            .ok_or_else(|| AppError::NotFound(format!("Card {} is not on the board", card_id)))
    }
}

/// Transport for the single stage-change call a move issues
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StageClient: Send + Sync {
    async fn change_stage(&self, request_id: i32, stage: Stage) -> AppResult<()>;
}

#[derive(Debug)]
pub enum MoveOutcome {
    /// Dropped where it already was, or onto an unknown card
    Unchanged,
    Committed { stage: Stage },
    Reverted { stage: Stage, error: AppError },
}

/// Run a drag-and-drop move end to end
pub async fn move_card<C>(
    board: &mut Board,
    client: &C,
    card_id: i32,
    target: DropTarget,
) -> AppResult<MoveOutcome>
where
    C: StageClient + ?Sized,
{
    let Some(destination) = board.resolve_drop(target) else {
        return Ok(MoveOutcome::Unchanged);
    };

    if !board.begin_move(card_id, destination)? {
        return Ok(MoveOutcome::Unchanged);
    }

    match client.change_stage(card_id, destination).await {
        Ok(()) => {
            board.commit(card_id)?;
            Ok(MoveOutcome::Committed { stage: destination })
        }
        Err(error) => {
            let stage = board.rollback(card_id)?;
            tracing::warn!(card_id, %destination, reverted_to = %stage, "Stage change rejected: {}", error);
            Ok(MoveOutcome::Reverted { stage, error })
        }
    }
}

#[derive(Serialize)]
struct StageBody {
    stage: Stage,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// Stage client talking to a running server over HTTP
#[derive(Clone)]
pub struct HttpStageClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpStageClient {
    /// `base_url` is the API root, e.g. `http://localhost:8080/api/v1`
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn error_from_response(status: reqwest::StatusCode, body: Option<ErrorBody>) -> AppError {
        let (kind, message) = match body {
            Some(b) => (b.error.unwrap_or_default(), b.message.unwrap_or_default()),
            None => (String::new(), status.to_string()),
        };

        match status.as_u16() {
            401 | 403 => AppError::Authentication(message),
            404 => AppError::NotFound(message),
            409 => AppError::Conflict(message),
            400 if kind == "InvalidStage" => AppError::InvalidStage(message),
            400 => AppError::BadRequest(message),
            _ => AppError::Internal(format!("Server answered {}: {}", status, message)),
        }
    }
}

#[async_trait]
impl StageClient for HttpStageClient {
    async fn change_stage(&self, request_id: i32, stage: Stage) -> AppResult<()> {
        let response = self
            .client
            .patch(format!("{}/requests/{}/stage", self.base_url, request_id))
            .bearer_auth(&self.token)
            .json(&StageBody { stage })
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Stage change request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.json::<ErrorBody>().await.ok();
        Err(Self::error_from_response(status, body))
    }
}
