//! Comment board with asynchronous moderation
//!
//! New comments are stored as `pending` and handed to a background task
//! that classifies them and records the outcome. Listing never waits on
//! the classifier.

use airdrop_core::{
    AirdropError, AirdropResult, Comment, ModerationResult, ModerationStatus, NewComment,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::moderation::{ContentClassifier, ModerationPolicy};

/// Queue depth of the moderation task
const MODERATION_QUEUE: usize = 100;

/// Flag recorded when the moderation queue could not take a comment
pub const MODERATION_BACKLOG_FLAG: &str = "moderation_backlog";

type CommentStore = Arc<RwLock<BTreeMap<u64, Comment>>>;

/// Background moderation request
#[derive(Debug)]
struct ModerationRequest {
    comment_id: u64,
    content: String,
}

/// Stores comments and moderates them in the background
#[derive(Debug)]
pub struct CommentService {
    comments: CommentStore,
    next_id: AtomicU64,
    clock: Arc<dyn Clock>,
    moderation_tx: mpsc::Sender<ModerationRequest>,
}

impl CommentService {
    /// Create the service and spawn its moderation task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        classifier: Arc<dyn ContentClassifier>,
        policy: ModerationPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let comments: CommentStore = Arc::new(RwLock::new(BTreeMap::new()));
        let (moderation_tx, moderation_rx) = mpsc::channel(MODERATION_QUEUE);

        let store = Arc::clone(&comments);
        tokio::spawn(async move {
            Self::moderation_task(store, classifier, policy, moderation_rx).await;
        });

        Self {
            comments,
            next_id: AtomicU64::new(1),
            clock,
            moderation_tx,
        }
    }

    async fn moderation_task(
        comments: CommentStore,
        classifier: Arc<dyn ContentClassifier>,
        policy: ModerationPolicy,
        mut rx: mpsc::Receiver<ModerationRequest>,
    ) {
        info!("Comment moderation task started ({})", classifier.name());

        while let Some(request) = rx.recv().await {
            let result = policy.moderate(classifier.as_ref(), &request.content).await;
            debug!(
                "Comment {} moderated: {:?} {:?}",
                request.comment_id, result.status, result.flags
            );
            if result.status == ModerationStatus::Rejected {
                warn!("Comment {} rejected: {:?}", request.comment_id, result.flags);
            }

            if let Some(comment) = comments.write().get_mut(&request.comment_id) {
                comment.moderation = result;
            }
        }

        info!("Comment moderation task stopped");
    }

    /// Post a comment. It is visible immediately as `pending`.
    pub fn create(&self, new: NewComment) -> AirdropResult<Comment> {
        new.validate()?;

        if let Some(parent_id) = new.parent_id {
            let parent_visible = self
                .comments
                .read()
                .get(&parent_id)
                .is_some_and(|parent| parent.moderation.is_visible());
            if !parent_visible {
                return Err(AirdropError::validation(format!(
                    "parent comment {} does not exist",
                    parent_id
                )));
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut comment = Comment {
            id,
            user_id: new.user_id,
            parent_id: new.parent_id,
            content: new.content.trim().to_string(),
            likes: 0,
            created_at: self.clock.now(),
            moderation: ModerationResult::pending(),
        };

        // Stored before queueing so the moderation task always finds it
        self.comments.write().insert(id, comment.clone());

        let request = ModerationRequest {
            comment_id: id,
            content: comment.content.clone(),
        };
        if let Err(e) = self.moderation_tx.try_send(request) {
            warn!("Could not queue comment {} for moderation: {}", id, e);
            comment.moderation = ModerationResult {
                status: ModerationStatus::Flagged,
                flags: vec![MODERATION_BACKLOG_FLAG.to_string()],
            };
            if let Some(stored) = self.comments.write().get_mut(&id) {
                stored.moderation = comment.moderation.clone();
            }
        }

        info!("Comment {} posted by user {}", id, comment.user_id);
        Ok(comment)
    }

    /// Every comment that has not been rejected, oldest first
    pub fn list(&self) -> Vec<Comment> {
        self.comments
            .read()
            .values()
            .filter(|c| c.moderation.is_visible())
            .cloned()
            .collect()
    }

    /// A single visible comment
    pub fn get(&self, id: u64) -> AirdropResult<Comment> {
        self.comments
            .read()
            .get(&id)
            .filter(|c| c.moderation.is_visible())
            .cloned()
            .ok_or_else(|| AirdropError::not_found(format!("comment {}", id)))
    }

    /// Add one like to a visible comment
    pub fn like(&self, id: u64) -> AirdropResult<Comment> {
        let mut comments = self.comments.write();
        match comments.get_mut(&id) {
            Some(comment) if comment.moderation.is_visible() => {
                comment.likes += 1;
                Ok(comment.clone())
            }
            _ => Err(AirdropError::not_found(format!("comment {}", id))),
        }
    }
}
