use crate::property::PropertyValue;

use super::{ObservationRecord, Taxon, TaxonRecord};

pub const TAXA_KEY: &str = "t_occurrences_occtax";

/// Taxa observed, ordered and unique by taxon id.
impl ObservationRecord {
    pub fn taxa(&self) -> &[TaxonRecord] {
        match self.properties().get(TAXA_KEY) {
            Some(PropertyValue::Taxa { value, .. }) => value,
            _ => &[],
        }
    }

    pub fn taxon(&self, taxon_id: i64) -> Option<&TaxonRecord> {
        self.taxa().iter().find(|t| t.taxon().id == taxon_id)
    }

    pub fn taxon_mut(&mut self, taxon_id: i64) -> Option<&mut TaxonRecord> {
        match self.properties_mut().get_mut(TAXA_KEY) {
            Some(PropertyValue::Taxa { value, .. }) => {
                value.iter_mut().find(|t| t.taxon().id == taxon_id)
            }
            _ => None,
        }
    }

    /// Adds a fresh entry for `taxon` and selects it. An entry for the same
    /// taxon id is replaced entirely, at the same position.
    pub fn add_taxon(&mut self, taxon: Taxon) {
        let record = TaxonRecord::new(self.internal_id, taxon);
        self.add_taxon_record(record);
    }

    /// Adds (or replaces by taxon id) a complete taxon record and selects it.
    pub fn add_taxon_record(&mut self, mut record: TaxonRecord) {
        record.set_record_id(self.internal_id);
        let taxon_id = record.taxon().id;

        self.update_taxa(|taxa| match taxa.iter_mut().find(|t| t.taxon().id == taxon_id) {
            Some(existing) => *existing = record,
            None => taxa.push(record),
        });

        self.selected_taxon = Some(taxon_id);
    }

    pub fn delete_taxon(&mut self, taxon_id: i64) -> Option<TaxonRecord> {
        let deleted = self.update_taxa(|taxa| {
            let position = taxa.iter().position(|t| t.taxon().id == taxon_id)?;
            Some(taxa.remove(position))
        });

        if deleted.is_some() && self.selected_taxon == Some(taxon_id) {
            self.selected_taxon = None;
        }

        deleted
    }

    /// Marks the taxon currently being edited. Returns `false` for an unknown
    /// taxon id.
    pub fn select_taxon(&mut self, taxon_id: i64) -> bool {
        if self.taxon(taxon_id).is_none() {
            return false;
        }

        self.selected_taxon = Some(taxon_id);
        true
    }

    pub fn selected_taxon(&self) -> Option<&TaxonRecord> {
        self.selected_taxon.and_then(|id| self.taxon(id))
    }

    pub fn selected_taxon_mut(&mut self) -> Option<&mut TaxonRecord> {
        let id = self.selected_taxon?;
        self.taxon_mut(id)
    }

    fn update_taxa<R>(&mut self, update: impl FnOnce(&mut Vec<TaxonRecord>) -> R) -> R {
        let mut taxa = match self.remove_property(TAXA_KEY) {
            Some(PropertyValue::Taxa { value, .. }) => value,
            _ => Vec::new(),
        };

        let result = update(&mut taxa);
        self.set_property(PropertyValue::taxa(TAXA_KEY, taxa));

        result
    }
}
