//! A user's project: its asset collection plus the saved session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::asset::{Asset, AssetId};
use crate::session::SessionState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub session: SessionState,
    /// Render passes used over the session's life, including undone ones.
    #[serde(default)]
    pub render_passes: u32,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: format!("project-{}", uuid::Uuid::new_v4().as_simple()),
            user_id: user_id.into(),
            name: name.into(),
            assets: Vec::new(),
            session: SessionState::default(),
            render_passes: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn add_asset(&mut self, asset: Asset) {
        self.assets.push(asset);
        self.touch();
    }

    /// Explicit deletion; the only way an asset leaves the collection.
    pub fn remove_asset(&mut self, id: &AssetId) -> Option<Asset> {
        let index = self.assets.iter().position(|a| &a.id == id)?;
        let removed = self.assets.remove(index);
        self.touch();
        Some(removed)
    }

    pub fn asset(&self, id: &AssetId) -> Option<&Asset> {
        self.assets.iter().find(|a| &a.id == id)
    }

    /// Assets carrying media a player can load, in collection order.
    pub fn playable_assets(&self) -> Vec<Asset> {
        self.assets
            .iter()
            .filter(|a| a.has_playable_media())
            .cloned()
            .collect()
    }

    /// Reconcile a local and remote copy: the later `updated_at` wins whole,
    /// ties keep the local copy. Edits made concurrently on both sides are not
    /// combined; the used render passes are the higher of the two.
    pub fn merge(local: Project, remote: Project) -> Project {
        let render_passes = local.render_passes.max(remote.render_passes);
        let mut merged = if remote.updated_at > local.updated_at {
            tracing::debug!(project.id = %local.id, "Remote copy is newer, replacing local");
            remote
        } else {
            local
        };
        merged.render_passes = render_passes;
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AssetContent, MediaRef};
    use chrono::Duration;

    fn image(id: &str) -> Asset {
        Asset::new(id, "Artist", AssetContent::image(MediaRef::url("https://i/x.png"))).with_id(id)
    }

    fn note(id: &str) -> Asset {
        Asset::new(id, "Writer", AssetContent::text("lyrics")).with_id(id)
    }

    #[test]
    fn test_add_and_remove_asset() {
        let mut project = Project::new("user-1", "Demo");
        let before = project.updated_at;

        project.add_asset(image("a1"));
        assert!(project.asset(&AssetId::new("a1")).is_some());
        assert!(project.updated_at >= before);

        let removed = project.remove_asset(&AssetId::new("a1")).unwrap();
        assert_eq!(removed.id.as_str(), "a1");
        assert!(project.assets.is_empty());
        assert!(project.remove_asset(&AssetId::new("a1")).is_none());
    }

    #[test]
    fn test_playable_assets_filters_text() {
        let mut project = Project::new("user-1", "Demo");
        project.add_asset(image("a1"));
        project.add_asset(note("a2"));
        project.add_asset(image("a3"));

        let ids: Vec<_> = project.playable_assets().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![AssetId::new("a1"), AssetId::new("a3")]);
    }

    #[test]
    fn test_merge_last_updated_wins() {
        let mut local = Project::new("user-1", "Local").with_id("p1");
        let mut remote = local.clone();
        remote.name = "Remote".to_string();

        remote.updated_at = local.updated_at + Duration::seconds(5);
        assert_eq!(Project::merge(local.clone(), remote.clone()).name, "Remote");

        local.updated_at = remote.updated_at + Duration::seconds(5);
        assert_eq!(Project::merge(local.clone(), remote.clone()).name, "Local");

        remote.updated_at = local.updated_at;
        assert_eq!(Project::merge(local, remote).name, "Local");
    }

    #[test]
    fn test_merge_keeps_higher_render_passes() {
        let mut local = Project::new("user-1", "Local").with_id("p1");
        local.render_passes = 3;
        let mut remote = local.clone();
        remote.render_passes = 1;
        remote.updated_at = local.updated_at + Duration::seconds(5);

        let merged = Project::merge(local, remote);
        assert_eq!(merged.render_passes, 3);
    }
}
