//! Interned tag collections referenced by original arcs

use rustc_hash::FxHashMap;

use super::TagId;

/// Key/value pairs of one way, as indices into the string table
pub type TagCollection = Vec<(u32, u32)>;

/// String table plus tag collections
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagStore {
    strings: Vec<String>,
    index: FxHashMap<String, u32>,
    collections: Vec<TagCollection>,
}

impl TagStore {
    /// Intern `s` and return its string-table index
    pub fn intern(&mut self, s: &str) -> u32 {
        if let Some(&idx) = self.index.get(s) {
            return idx;
        }
        let idx = self.strings.len() as u32;
        self.strings.push(s.to_string());
        self.index.insert(s.to_string(), idx);
        idx
    }

    /// Store a collection of key/value pairs and return its id
    pub fn add_collection<'a, I>(&mut self, pairs: I) -> TagId
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let collection: TagCollection = pairs
            .into_iter()
            .map(|(k, v)| (self.intern(k), self.intern(v)))
            .collect();
        let id = self.collections.len() as TagId;
        self.collections.push(collection);
        id
    }

    /// Value of `key` in collection `id`
    pub fn get(&self, id: TagId, key: &str) -> Option<&str> {
        let key_idx = *self.index.get(key)?;
        self.collections
            .get(id as usize)?
            .iter()
            .find(|(k, _)| *k == key_idx)
            .map(|(_, v)| self.strings[*v as usize].as_str())
    }

    pub fn string(&self, idx: u32) -> Option<&str> {
        self.strings.get(idx as usize).map(String::as_str)
    }

    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    pub fn collection(&self, id: TagId) -> Option<&TagCollection> {
        self.collections.get(id as usize)
    }

    pub fn collection_count(&self) -> usize {
        self.collections.len()
    }

    /// All `(collection, key, value)` triples in collection order
    pub fn triples(&self) -> impl Iterator<Item = (TagId, u32, u32)> + '_ {
        self.collections
            .iter()
            .enumerate()
            .flat_map(|(id, pairs)| pairs.iter().map(move |&(k, v)| (id as TagId, k, v)))
    }

    /// Rebuild a store from a string table and triples.
    ///
    /// Collections without any triple come back empty; `n_collections`
    /// preserves their ids.
    pub fn from_parts(
        strings: Vec<String>,
        n_collections: usize,
        triples: impl IntoIterator<Item = (TagId, u32, u32)>,
    ) -> Self {
        let index = strings
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i as u32))
            .collect();
        let mut collections = vec![TagCollection::new(); n_collections];
        for (id, k, v) in triples {
            let id = id as usize;
            if id >= collections.len() {
                collections.resize(id + 1, TagCollection::new());
            }
            collections[id].push((k, v));
        }
        Self {
            strings,
            index,
            collections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_deduplicates() {
        let mut store = TagStore::default();
        let a = store.intern("highway");
        let b = store.intern("residential");
        assert_eq!(store.intern("highway"), a);
        assert_ne!(a, b);
        assert_eq!(store.strings().len(), 2);
    }

    #[test]
    fn test_collection_lookup() {
        let mut store = TagStore::default();
        let id = store.add_collection([("highway", "primary"), ("oneway", "yes")]);
        let other = store.add_collection([("highway", "service")]);
        assert_eq!(store.get(id, "oneway"), Some("yes"));
        assert_eq!(store.get(other, "highway"), Some("service"));
        assert_eq!(store.get(other, "oneway"), None);
        assert_eq!(store.get(99, "highway"), None);
    }

    #[test]
    fn test_from_parts_rebuilds_store() {
        let mut store = TagStore::default();
        store.add_collection([("highway", "primary")]);
        store.add_collection(std::iter::empty());
        store.add_collection([("access", "destination"), ("highway", "service")]);

        let rebuilt = TagStore::from_parts(
            store.strings().to_vec(),
            store.collection_count(),
            store.triples(),
        );
        assert_eq!(rebuilt, store);
        assert_eq!(rebuilt.get(2, "access"), Some("destination"));
    }
}
