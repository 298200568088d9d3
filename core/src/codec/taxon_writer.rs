use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::record::{CountingRecord, TaxonRecord};

use super::fields::Level;
use super::taxon_reader::{GROUP_KEY, INDEX_KEY, KINGDOM_KEY, TAXON_ID_KEY, TAXON_NAME_KEY};
use super::writer::{write_property, WriteOptions};

pub(super) struct TaxaWriter<'a> {
    pub taxa: &'a [TaxonRecord],
    pub options: WriteOptions<'a>,
}

impl Serialize for TaxaWriter<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.taxa.len()))?;

        for taxon in self.taxa {
            seq.serialize_element(&TaxonWriter {
                taxon,
                options: self.options,
            })?;
        }

        seq.end()
    }
}

/// One element of `t_occurrences_occtax`, also the body of the remote
/// occurrence route.
pub struct TaxonWriter<'a> {
    pub taxon: &'a TaxonRecord,
    pub options: WriteOptions<'a>,
}

impl Serialize for TaxonWriter<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let taxon = self.taxon.taxon();
        let mut map = serializer.serialize_map(None)?;

        map.serialize_entry(TAXON_ID_KEY, &taxon.id)?;
        map.serialize_entry(TAXON_NAME_KEY, &taxon.name)?;
        map.serialize_entry(KINGDOM_KEY, &taxon.taxonomy.kingdom)?;

        if let Some(group) = &taxon.taxonomy.group {
            map.serialize_entry(GROUP_KEY, group)?;
        }

        for value in self.taxon.properties().values() {
            write_property(&mut map, value, Some(Level::Taxon), self.options)?;
        }

        map.end()
    }
}

pub(super) struct CountingListWriter<'a> {
    pub countings: &'a [CountingRecord],
    pub options: WriteOptions<'a>,
}

impl Serialize for CountingListWriter<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.countings.len()))?;

        for counting in self.countings {
            seq.serialize_element(&CountingWriter {
                counting,
                options: self.options,
            })?;
        }

        seq.end()
    }
}

struct CountingWriter<'a> {
    counting: &'a CountingRecord,
    options: WriteOptions<'a>,
}

impl Serialize for CountingWriter<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;

        map.serialize_entry(INDEX_KEY, &self.counting.index())?;

        for value in self.counting.properties().values() {
            write_property(&mut map, value, Some(Level::Counting), self.options)?;
        }

        map.end()
    }
}
