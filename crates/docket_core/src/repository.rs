//! Repositories: per-aggregate stores of locally modified entities.
//!
//! A [`Repository`] owns an [`EntitySet`] and knows how to project one of
//! its entities into stored documents. The transaction machinery only ever
//! sees repositories through [`RepositorySet`], which is implemented for a
//! single repository and for tuples of up to six, so one unit of work can
//! span several aggregate types.

use crate::document::DocumentWrite;
use crate::entity::{EntitySet, Identifiable, TrackingMode};
use crate::error::CoreResult;
use crate::operation::{OpType, Operation};

/// A store of entities of one type.
///
/// Implementors supply storage for the [`EntitySet`] and the projection
/// [`Repository::to_documents`]; lifecycle handling is provided.
pub trait Repository {
    /// The entity type this repository persists.
    type Entity: Identifiable;

    /// Returns the tracked entities.
    fn entities(&self) -> &EntitySet<Self::Entity>;

    /// Returns the tracked entities mutably.
    fn entities_mut(&mut self) -> &mut EntitySet<Self::Entity>;

    /// Projects one entity into the documents that store it.
    ///
    /// An aggregate may decompose into several documents, e.g. a parent and
    /// one sub-collection document per child.
    ///
    /// # Errors
    ///
    /// Fails if the entity cannot be mapped to a valid document path.
    fn to_documents(&self, entity: &Self::Entity) -> CoreResult<Vec<DocumentWrite>>;

    /// Marks `entity` for persistence.
    fn add(&mut self, entity: Self::Entity) {
        self.entities_mut().add(entity);
    }

    /// Marks `entity` for deletion.
    fn remove(&mut self, entity: Self::Entity) {
        self.entities_mut().remove(entity);
    }

    /// Records an entity that was just read through a coordinator.
    fn track(&mut self, entity: Self::Entity) {
        self.entities_mut().track(entity);
    }

    /// Projects every pending entity into operations, in first-seen order.
    ///
    /// # Errors
    ///
    /// Propagates projection failures.
    fn operations(&self) -> CoreResult<Vec<Operation>> {
        let mut ops = Vec::new();
        for tracked in self.entities().iter() {
            if tracked.mode == TrackingMode::Untracked {
                continue;
            }
            let op_type = OpType::for_mode(tracked.mode)?;
            for write in self.to_documents(&tracked.model)? {
                ops.push(Operation::new(op_type, write.path, write.data));
            }
        }
        Ok(ops)
    }
}

/// The repositories registered with one unit of work.
pub trait RepositorySet {
    /// Forgets every tracked entity in every repository.
    fn reset(&mut self);

    /// Collects operations from every repository in registration order.
    ///
    /// # Errors
    ///
    /// Propagates projection failures.
    fn all_operations(&self) -> CoreResult<Vec<Operation>>;
}

impl<R: Repository> RepositorySet for R {
    fn reset(&mut self) {
        self.entities_mut().clear();
    }

    fn all_operations(&self) -> CoreResult<Vec<Operation>> {
        self.operations()
    }
}

macro_rules! impl_repository_set {
    ($($repo:ident $idx:tt),+) => {
        impl<$($repo: Repository),+> RepositorySet for ($($repo,)+) {
            fn reset(&mut self) {
                $(self.$idx.entities_mut().clear();)+
            }

            fn all_operations(&self) -> CoreResult<Vec<Operation>> {
                let mut ops = Vec::new();
                $(ops.extend(self.$idx.operations()?);)+
                Ok(ops)
            }
        }
    };
}

impl_repository_set!(A 0);
impl_repository_set!(A 0, B 1);
impl_repository_set!(A 0, B 1, C 2);
impl_repository_set!(A 0, B 1, C 2, D 3);
impl_repository_set!(A 0, B 1, C 2, D 3, E 4);
impl_repository_set!(A 0, B 1, C 2, D 3, E 4, F 5);
