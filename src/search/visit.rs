use crate::error::{Error, Result};
use crate::graph::{VertexId, Weight};

/// Virtual search endpoint: one or more real vertices, each entered with a
/// partial weight (a query point resolved onto an edge interior)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitList {
    entries: Vec<(VertexId, Weight)>,
}

impl VisitList {
    pub fn new(entries: Vec<(VertexId, Weight)>) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::InvalidInput("visit list needs at least one entry".to_string()));
        }
        Ok(Self { entries })
    }

    /// Entries known to be non-empty
    pub(crate) fn from_entries(entries: Vec<(VertexId, Weight)>) -> Self {
        debug_assert!(!entries.is_empty());
        Self { entries }
    }

    /// A real vertex entered at weight 0
    pub fn single(vertex: VertexId) -> Self {
        Self {
            entries: vec![(vertex, 0)],
        }
    }

    pub fn entries(&self) -> &[(VertexId, Weight)] {
        &self.entries
    }

    pub fn vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.entries.iter().map(|&(v, _)| v)
    }
}

impl From<VertexId> for VisitList {
    fn from(vertex: VertexId) -> Self {
        Self::single(vertex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_visit_list_rejected() {
        assert!(matches!(VisitList::new(vec![]), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_visit_list_entries() {
        let list = VisitList::new(vec![(3, 12), (4, 30)]).unwrap();
        assert_eq!(list.entries(), &[(3, 12), (4, 30)]);
        assert_eq!(list.vertices().collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!(VisitList::from(9).entries(), &[(9, 0)]);
    }
}
