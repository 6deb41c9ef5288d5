use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::models::{IdeaFilter, IdeaInput, Label, LabelKind, OrphanCandidate, RecipeIdea};
use crate::reaper::Reaper;
use crate::store::Store;

/// Recipe ideas together with their tag and ingredient associations.
///
/// Create and update write the idea row, resolve label names and replace the
/// association sets in one transaction. Labels dropped by an update are handed
/// to the [`Reaper`] after the commit.
#[derive(Clone)]
pub struct IdeaService {
    store: Store,
    reaper: Reaper,
}

impl IdeaService {
    #[must_use]
    pub fn new(store: Store, reaper: Reaper) -> Self {
        Self { store, reaper }
    }

    pub async fn list(&self, filter: IdeaFilter) -> Result<Vec<RecipeIdea>> {
        self.store.run(move |db| db.list_ideas(&filter)).await
    }

    pub async fn get(&self, id: i64) -> Result<RecipeIdea> {
        self.store.run(move |db| db.get_idea(id)).await
    }

    pub async fn create(&self, input: IdeaInput) -> Result<RecipeIdea> {
        let input = normalized(input)?;
        self.store
            .transaction(move |db| {
                let id = db.insert_idea(&input)?;
                for kind in LabelKind::ALL {
                    if let Some(names) = input.names(kind) {
                        let labels = db.resolve_all(names, kind)?;
                        db.set_idea_labels(kind, id, &label_ids(&labels))?;
                    }
                }
                db.get_idea(id)
            })
            .await
    }

    /// Replace the idea's attributes, and each association set whose name
    /// list is `Some`.
    pub async fn update(&self, id: i64, input: IdeaInput) -> Result<RecipeIdea> {
        let input = normalized(input)?;
        let (idea, dropped) = self
            .store
            .transaction(move |db| {
                if db.find_idea(id)?.is_none() {
                    return Err(Error::not_found("Recipe idea", id));
                }
                db.update_idea_attributes(id, &input)?;

                let mut dropped = Vec::new();
                for kind in LabelKind::ALL {
                    let Some(names) = input.names(kind) else {
                        continue;
                    };
                    let before = db.idea_label_ids(kind, id)?;
                    let after: HashSet<i64> = label_ids(&db.resolve_all(names, kind)?)
                        .into_iter()
                        .collect();
                    let mut next: Vec<i64> = after.iter().copied().collect();
                    next.sort_unstable();
                    db.set_idea_labels(kind, id, &next)?;
                    dropped.extend(
                        before
                            .into_iter()
                            .filter(|prev| !after.contains(prev))
                            .map(|label_id| OrphanCandidate { id: label_id, kind }),
                    );
                }
                Ok((db.get_idea(id)?, dropped))
            })
            .await?;

        self.reaper.dispatch(dropped);
        Ok(idea)
    }

    /// Delete the idea. Its tags and ingredients are left in place.
    pub async fn delete(&self, id: i64) -> Result<()> {
        self.store.run(move |db| db.delete_idea(id)).await
    }

    pub async fn tags(&self) -> Result<Vec<Label>> {
        self.store.run(|db| db.list_labels(LabelKind::Tag)).await
    }

    pub async fn ingredients(&self) -> Result<Vec<Label>> {
        self.store
            .run(|db| db.list_labels(LabelKind::Ingredient))
            .await
    }
}

fn normalized(mut input: IdeaInput) -> Result<IdeaInput> {
    input.validate()?;
    input.name = input.name.trim().to_string();
    Ok(input)
}

fn label_ids(labels: &[Label]) -> Vec<i64> {
    labels.iter().map(|l| l.id).collect()
}
