use crate::twitter::Tweet;

/// Detects when a freshly fetched page starts over on the tweet we just handled.
///
/// Deleting tweets shifts the live timeline under the next request, so
/// consecutive pages can overlap at their edges. Seeing the last handled id
/// again means everything from there on has been covered already.
#[derive(Debug, Default)]
pub struct BoundaryDetector {
    last_id: Option<String>,
    reached: bool,
}

impl BoundaryDetector {
    /// Returns `false` once the boundary is hit; the caller must stop
    /// consuming the page at that tweet.
    pub fn observe(&mut self, tweet: &Tweet) -> bool {
        if self.reached {
            return false;
        }
        if self.last_id.as_deref() == Some(tweet.id_str.as_str()) {
            self.reached = true;
            return false;
        }
        self.last_id = Some(tweet.id_str.clone());
        true
    }

    pub fn reached(&self) -> bool {
        self.reached
    }

    pub fn last_id(&self) -> Option<&str> {
        self.last_id.as_deref()
    }
}
