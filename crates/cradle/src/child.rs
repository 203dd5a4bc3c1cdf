//! Child registry.
//!
//! Child records live in the children collection keyed by a decimal ID.
//! Every read is scoped to the owning account: a child created by one
//! account is invisible to every other account.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ChildrenConfig;
use crate::error::{ChildError, Error};
use crate::payload::{encode_payload, PayloadEncoder};
use crate::session::Session;
use crate::store::{sanitize_file_name, BlobStore, Collection, JsonStore, Records};

/// Key of the child counter in the sequences collection.
const CHILD_SEQUENCE: &str = "children";

/// Decimal string ID of a child record.
pub type ChildId = String;

/// A contact attached to a child record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Guardian {
    /// Contact name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Contact phone number.
    pub phone: String,
}

impl Guardian {
    /// Check whether every field is empty. Whitespace counts as content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.email.is_empty() && self.phone.is_empty()
    }
}

impl FromStr for Guardian {
    type Err = String;

    /// Parse `name,email,phone`; missing trailing fields are empty.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = s.splitn(3, ',').map(|f| f.trim().to_string());
        let guardian = Self {
            name: fields.next().unwrap_or_default(),
            email: fields.next().unwrap_or_default(),
            phone: fields.next().unwrap_or_default(),
        };
        if guardian.is_empty() {
            return Err("guardian needs at least one of name, email, phone".to_string());
        }
        Ok(guardian)
    }
}

/// A child record as seen by its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Child {
    /// Record ID, assigned at creation and never reused.
    pub id: ChildId,
    /// Child's name.
    pub name: String,
    /// Age in years.
    pub age: u32,
    /// Free-text notes.
    pub notes: String,
    /// Stored photo path relative to the data directory, or empty.
    pub photo_ref: String,
    /// Email of the owning account.
    pub owner_email: String,
    /// Additional contacts, in entry order.
    pub guardians: Vec<Guardian>,
}

impl Child {
    /// Contacts printed on the identification card.
    ///
    /// Falls back to the owner's email when no guardian was recorded, so every
    /// card carries a way to reach someone.
    #[must_use]
    pub fn contacts(&self) -> Vec<Guardian> {
        if self.guardians.is_empty() {
            vec![Guardian {
                email: self.owner_email.clone(),
                ..Guardian::default()
            }]
        } else {
            self.guardians.clone()
        }
    }

    /// Identification payload text for this child.
    #[must_use]
    pub fn payload_text(&self) -> String {
        encode_payload(&self.name, &self.contacts())
    }
}

/// Persisted form of a child, keyed by ID in the children collection.
///
/// The aliases accept records written by the first releases.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChildRecord {
    name: String,
    #[serde(default)]
    age: u32,
    #[serde(default)]
    notes: String,
    #[serde(default)]
    photo: String,
    #[serde(alias = "created_by")]
    owner_email: String,
    #[serde(default, alias = "parents")]
    guardians: Vec<Guardian>,
}

impl ChildRecord {
    /// Owner of a raw record, read without decoding the rest of it.
    fn owner_of(value: &Value) -> Option<&str> {
        value
            .get("owner_email")
            .or_else(|| value.get("created_by"))
            .and_then(Value::as_str)
    }

    fn into_child(self, id: &str) -> Child {
        Child {
            id: id.to_string(),
            name: self.name,
            age: self.age,
            notes: self.notes,
            photo_ref: self.photo,
            owner_email: self.owner_email,
            guardians: self.guardians,
        }
    }
}

/// An uploaded photo as received from the front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoUpload {
    /// Original file name.
    pub file_name: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

/// Input for [`ChildRegistry::create_child`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewChild {
    /// Child's name; required.
    pub name: String,
    /// Age in years.
    pub age: u32,
    /// Free-text notes.
    pub notes: String,
    /// Optional photo.
    pub photo: Option<PhotoUpload>,
    /// Contacts; entries with every field empty are dropped.
    pub guardians: Vec<Guardian>,
}

impl NewChild {
    /// Start a new child with just a name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Owns the children collection, photos and identification images.
#[derive(Debug)]
pub struct ChildRegistry {
    store: JsonStore,
    photos: BlobStore,
    photos_prefix: String,
    max_age: u32,
    encoder: PayloadEncoder,
}

impl ChildRegistry {
    /// Create a registry.
    ///
    /// `photos_prefix` is the photo directory as recorded in `photo_ref`.
    #[must_use]
    pub fn new(
        store: JsonStore,
        photos: BlobStore,
        photos_prefix: impl Into<String>,
        config: &ChildrenConfig,
        encoder: PayloadEncoder,
    ) -> Self {
        Self {
            store,
            photos,
            photos_prefix: photos_prefix.into(),
            max_age: config.max_age,
            encoder,
        }
    }

    /// Create a child owned by the session's account and render its
    /// identification image.
    ///
    /// A failed image render is logged and tolerated: the child exists and
    /// its image is rebuilt on the next request.
    ///
    /// # Errors
    ///
    /// Returns [`ChildError::MissingName`] or [`ChildError::AgeOutOfRange`]
    /// without touching the store, or [`ChildError::Store`] if a write fails.
    pub fn create_child(&self, session: &Session, new: NewChild) -> Result<ChildId, ChildError> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(ChildError::MissingName);
        }
        if new.age > self.max_age {
            return Err(ChildError::AgeOutOfRange {
                age: new.age,
                max: self.max_age,
            });
        }

        let mut children = self.store.load(Collection::Children)?;
        let mut sequences = self.store.load(Collection::Sequences)?;
        let next = next_child_number(&children, &sequences)?;
        let id = next.to_string();

        let photo_ref = match &new.photo {
            Some(upload) => {
                let file_name = format!("{id}_{}", sanitize_file_name(&upload.file_name));
                self.photos.write(&file_name, &upload.bytes)?;
                format!("{}/{file_name}", self.photos_prefix)
            }
            None => String::new(),
        };

        let record = ChildRecord {
            name: name.to_string(),
            age: new.age,
            notes: new.notes,
            photo: photo_ref,
            owner_email: session.email().to_string(),
            guardians: new.guardians.into_iter().filter(|g| !g.is_empty()).collect(),
        };
        children.insert(id.clone(), serde_json::to_value(&record).map_err(Error::from)?);
        self.store.save(Collection::Children, &children)?;

        sequences.insert(CHILD_SEQUENCE.to_string(), Value::from(next));
        if let Err(e) = self.store.save(Collection::Sequences, &sequences) {
            warn!(child_id = %id, error = %e, "Failed to persist child counter");
        }

        info!(child_id = %id, owner = session.email(), "Created child");

        let child = record.into_child(&id);
        if let Err(e) = self.encoder.render(&id, &child.payload_text()) {
            warn!(child_id = %id, error = %e, "Identification image not rendered");
        }

        Ok(id)
    }

    /// List the session's children in stored order.
    ///
    /// # Errors
    ///
    /// Returns [`ChildError::Store`] if the collection cannot be read.
    pub fn list_children(&self, session: &Session) -> Result<Vec<Child>, ChildError> {
        let children = self.store.load(Collection::Children)?;
        let mut owned = Vec::new();
        for (id, value) in &children {
            match ChildRecord::owner_of(value) {
                Some(owner) if owner == session.email() => {
                    owned.push(self.parse_record(id, value)?.into_child(id));
                }
                Some(_) => {}
                None => warn!(child_id = %id, "Skipping child record without an owner"),
            }
        }
        debug!(owner = session.email(), count = owned.len(), "Listed children");
        Ok(owned)
    }

    /// Get one of the session's children.
    ///
    /// # Errors
    ///
    /// Returns [`ChildError::NotFound`] if the ID is unknown or owned by
    /// another account.
    pub fn get_child(&self, session: &Session, child_id: &str) -> Result<Child, ChildError> {
        let children = self.store.load(Collection::Children)?;
        let Some(value) = children
            .get(child_id)
            .filter(|value| ChildRecord::owner_of(value) == Some(session.email()))
        else {
            return Err(ChildError::not_found(child_id));
        };
        Ok(self.parse_record(child_id, value)?.into_child(child_id))
    }

    /// Get the rendered identification image for one of the session's
    /// children, regenerating it from the current record when missing or
    /// stale.
    ///
    /// # Errors
    ///
    /// Returns [`ChildError::NotFound`] if the child is not visible to the
    /// session, or [`ChildError::Store`] if rendering fails.
    pub fn get_identification_payload(
        &self,
        session: &Session,
        child_id: &str,
    ) -> Result<Vec<u8>, ChildError> {
        let child = self.get_child(session, child_id)?;
        Ok(self.encoder.image(&child.id, &child.payload_text())?)
    }

    /// The image encoder used by this registry.
    #[must_use]
    pub fn encoder(&self) -> &PayloadEncoder {
        &self.encoder
    }

    fn parse_record(&self, id: &str, value: &Value) -> Result<ChildRecord, ChildError> {
        serde_json::from_value(value.clone()).map_err(|e| {
            ChildError::Store(Error::CorruptCollection {
                path: self.store.path(Collection::Children),
                message: format!("record {id}: {e}"),
            })
        })
    }

    /// Number of stored photos.
    ///
    /// # Errors
    ///
    /// Returns an error if the photo directory cannot be listed.
    pub fn photo_count(&self) -> crate::Result<usize> {
        self.photos.count()
    }
}

/// Next child number: one past the persisted counter, the record count and
/// the largest numeric ID, whichever is highest.
fn next_child_number(children: &Records, sequences: &Records) -> crate::Result<u64> {
    let counter = sequences
        .get(CHILD_SEQUENCE)
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let count = u64::try_from(children.len()).unwrap_or(u64::MAX);
    let largest = children
        .keys()
        .filter_map(|id| id.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    counter
        .max(count)
        .max(largest)
        .checked_add(1)
        .ok_or_else(|| Error::internal("child ID space exhausted"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PayloadConfig, StorageConfig};
    use crate::payload::TextCardRasterizer;
    use crate::session::test_session as session;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_registry() -> (ChildRegistry, JsonStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonStore::open(temp_dir.path(), &StorageConfig::default()).unwrap();
        let photos = BlobStore::open(temp_dir.path().join("photos")).unwrap();
        let images = BlobStore::open(temp_dir.path().join("qrcodes")).unwrap();
        let encoder = PayloadEncoder::new(
            images,
            PayloadConfig::default(),
            Box::new(TextCardRasterizer),
        );
        let registry = ChildRegistry::new(
            store.clone(),
            photos,
            "photos",
            &ChildrenConfig::default(),
            encoder,
        );
        (registry, store, temp_dir)
    }

    fn snapshot(dir: &std::path::Path) -> Vec<(String, Vec<u8>)> {
        let mut files: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.path().is_file())
            .map(|e| {
                (
                    e.file_name().to_string_lossy().into_owned(),
                    std::fs::read(e.path()).unwrap(),
                )
            })
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_guardian_is_empty() {
        assert!(Guardian::default().is_empty());
        assert!(!Guardian {
            name: "  ".to_string(),
            ..Guardian::default()
        }
        .is_empty());
        assert!(!Guardian {
            phone: "1".to_string(),
            ..Guardian::default()
        }
        .is_empty());
    }

    #[test]
    fn test_guardian_from_str() {
        let guardian: Guardian = "Ann, ann@x.com, 555".parse().unwrap();
        assert_eq!(guardian.name, "Ann");
        assert_eq!(guardian.email, "ann@x.com");
        assert_eq!(guardian.phone, "555");

        let partial: Guardian = "Bob".parse().unwrap();
        assert_eq!(partial.email, "");

        assert!(",,".parse::<Guardian>().is_err());
    }

    #[test]
    fn test_ids_are_sequential() {
        let (registry, _store, _temp_dir) = create_test_registry();
        let owner = session("pat@example.com");

        let first = registry.create_child(&owner, NewChild::named("Timmy")).unwrap();
        let second = registry.create_child(&owner, NewChild::named("Sue")).unwrap();

        assert_eq!(first, "1");
        assert_eq!(second, "2");
    }

    #[test]
    fn test_list_is_scoped_to_owner() {
        let (registry, _store, _temp_dir) = create_test_registry();
        let owner = session("pat@example.com");
        let stranger = session("eve@example.com");

        registry.create_child(&owner, NewChild::named("Timmy")).unwrap();
        registry.create_child(&owner, NewChild::named("Sue")).unwrap();

        let mine = registry.list_children(&owner).unwrap();
        let names: Vec<&str> = mine.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Timmy", "Sue"]);
        assert!(registry.list_children(&stranger).unwrap().is_empty());
    }

    #[test]
    fn test_missing_name_leaves_store_untouched() {
        let (registry, _store, temp_dir) = create_test_registry();
        let owner = session("pat@example.com");
        registry.create_child(&owner, NewChild::named("Timmy")).unwrap();
        let before = snapshot(temp_dir.path());

        let result = registry.create_child(&owner, NewChild::named("   "));

        assert!(matches!(result, Err(ChildError::MissingName)));
        assert_eq!(snapshot(temp_dir.path()), before);
    }

    #[test]
    fn test_age_out_of_range() {
        let (registry, store, _temp_dir) = create_test_registry();
        let owner = session("pat@example.com");

        let mut new = NewChild::named("Timmy");
        new.age = 26;
        let result = registry.create_child(&owner, new);

        assert!(matches!(
            result,
            Err(ChildError::AgeOutOfRange { age: 26, max: 25 })
        ));
        assert!(!store.path(Collection::Children).exists());
    }

    #[test]
    fn test_age_bounds_are_inclusive() {
        let (registry, _store, _temp_dir) = create_test_registry();
        let owner = session("pat@example.com");

        let mut oldest = NewChild::named("Sam");
        oldest.age = 25;
        let newborn = NewChild::named("Ivy");

        let oldest_id = registry.create_child(&owner, oldest).unwrap();
        let newborn_id = registry.create_child(&owner, newborn).unwrap();

        assert_eq!(registry.get_child(&owner, &oldest_id).unwrap().age, 25);
        assert_eq!(registry.get_child(&owner, &newborn_id).unwrap().age, 0);
    }

    #[test]
    fn test_empty_guardians_are_dropped() {
        let (registry, _store, _temp_dir) = create_test_registry();
        let owner = session("pat@example.com");

        let mut new = NewChild::named("Timmy");
        new.guardians = vec![
            Guardian::default(),
            Guardian {
                name: "Ann".to_string(),
                email: "ann@x.com".to_string(),
                phone: "555".to_string(),
            },
        ];
        let id = registry.create_child(&owner, new).unwrap();

        let child = registry.get_child(&owner, &id).unwrap();
        assert_eq!(child.guardians.len(), 1);
        assert_eq!(child.guardians[0].name, "Ann");
    }

    #[test]
    fn test_photo_is_stored_under_child_id() {
        let (registry, _store, temp_dir) = create_test_registry();
        let owner = session("pat@example.com");

        let mut new = NewChild::named("Timmy");
        new.photo = Some(PhotoUpload {
            file_name: "../face.png".to_string(),
            bytes: b"png".to_vec(),
        });
        let id = registry.create_child(&owner, new).unwrap();

        let child = registry.get_child(&owner, &id).unwrap();
        assert_eq!(child.photo_ref, "photos/1_face.png");
        assert_eq!(
            std::fs::read(temp_dir.path().join("photos/1_face.png")).unwrap(),
            b"png"
        );
        assert_eq!(registry.photo_count().unwrap(), 1);
    }

    #[test]
    fn test_creation_renders_identification_image() {
        let (registry, _store, temp_dir) = create_test_registry();
        let owner = session("pat@example.com");

        let id = registry.create_child(&owner, NewChild::named("Timmy")).unwrap();

        assert!(temp_dir.path().join(format!("qrcodes/{id}.txt")).is_file());
    }

    #[test]
    fn test_get_child_hides_other_owners() {
        let (registry, _store, _temp_dir) = create_test_registry();
        let owner = session("pat@example.com");
        let id = registry.create_child(&owner, NewChild::named("Timmy")).unwrap();

        let result = registry.get_child(&session("eve@example.com"), &id);
        assert!(matches!(result, Err(ChildError::NotFound { .. })));
        assert!(matches!(
            registry.get_child(&owner, "99"),
            Err(ChildError::NotFound { .. })
        ));
    }

    #[test]
    fn test_identification_payload_is_stable() {
        let (registry, _store, _temp_dir) = create_test_registry();
        let owner = session("pat@example.com");
        let mut new = NewChild::named("Timmy");
        new.guardians = vec![Guardian {
            name: "A".to_string(),
            email: "a@x.com".to_string(),
            phone: "1".to_string(),
        }];
        let id = registry.create_child(&owner, new).unwrap();

        let first = registry.get_identification_payload(&owner, &id).unwrap();
        let second = registry.get_identification_payload(&owner, &id).unwrap();

        assert_eq!(first, second);
        let text = String::from_utf8(first).unwrap();
        assert!(text.contains("I'm lost! My name is Timmy."));
        assert!(text.contains("A - Email: a@x.com - Phone: 1"));
    }

    #[test]
    fn test_identification_payload_regenerates_missing_image() {
        let (registry, _store, temp_dir) = create_test_registry();
        let owner = session("pat@example.com");
        let id = registry.create_child(&owner, NewChild::named("Timmy")).unwrap();

        std::fs::remove_file(temp_dir.path().join(format!("qrcodes/{id}.txt"))).unwrap();
        registry.encoder().invalidate(&id);

        let image = registry.get_identification_payload(&owner, &id).unwrap();
        assert!(!image.is_empty());
        assert!(temp_dir.path().join(format!("qrcodes/{id}.txt")).is_file());
    }

    #[test]
    fn test_identification_payload_follows_edited_record() {
        let (registry, store, temp_dir) = create_test_registry();
        let owner = session("pat@example.com");
        let id = registry.create_child(&owner, NewChild::named("Timmy")).unwrap();
        let sum_path = temp_dir.path().join(format!("qrcodes/{id}.sum"));
        let old_sum = std::fs::read(&sum_path).unwrap();

        let mut children = store.load(Collection::Children).unwrap();
        children[&id]["name"] = json!("Tim");
        store.save(Collection::Children, &children).unwrap();

        let image = registry.get_identification_payload(&owner, &id).unwrap();

        let text = String::from_utf8(image).unwrap();
        assert!(text.contains("My name is Tim."));
        assert_ne!(std::fs::read(&sum_path).unwrap(), old_sum);
        assert_eq!(
            std::fs::read_to_string(temp_dir.path().join(format!("qrcodes/{id}.txt"))).unwrap(),
            text
        );
    }

    #[test]
    fn test_identification_payload_unknown_child() {
        let (registry, _store, _temp_dir) = create_test_registry();
        let result = registry.get_identification_payload(&session("pat@example.com"), "1");
        assert!(matches!(result, Err(ChildError::NotFound { .. })));
    }

    #[test]
    fn test_payload_falls_back_to_owner_email() {
        let child = Child {
            id: "1".to_string(),
            name: "Timmy".to_string(),
            age: 4,
            notes: String::new(),
            photo_ref: String::new(),
            owner_email: "pat@example.com".to_string(),
            guardians: Vec::new(),
        };

        assert!(child
            .payload_text()
            .ends_with("\n - Email: pat@example.com - Phone: "));
    }

    #[test]
    fn test_ids_are_not_reused_after_removal() {
        let (registry, store, _temp_dir) = create_test_registry();
        let owner = session("pat@example.com");
        registry.create_child(&owner, NewChild::named("Timmy")).unwrap();
        registry.create_child(&owner, NewChild::named("Sue")).unwrap();

        // Simulate an out-of-band removal of the first record
        let mut children = store.load(Collection::Children).unwrap();
        children.remove("1");
        store.save(Collection::Children, &children).unwrap();

        let id = registry.create_child(&owner, NewChild::named("Max")).unwrap();
        assert_eq!(id, "3");
    }

    #[test]
    fn test_next_child_number_without_counter() {
        let mut children = Records::new();
        children.insert("1".to_string(), json!({}));
        children.insert("7".to_string(), json!({}));

        assert_eq!(next_child_number(&children, &Records::new()).unwrap(), 8);
        assert_eq!(next_child_number(&Records::new(), &Records::new()).unwrap(), 1);
    }

    #[test]
    fn test_exhausted_id_space_keeps_existing_record() {
        let (registry, store, _temp_dir) = create_test_registry();
        let owner = session("pat@example.com");
        let mut children = Records::new();
        children.insert(
            u64::MAX.to_string(),
            json!({"name": "Old", "owner_email": "pat@example.com"}),
        );
        store.save(Collection::Children, &children).unwrap();

        let result = registry.create_child(&owner, NewChild::named("New"));

        assert!(matches!(result, Err(ChildError::Store(Error::Internal(_)))));
        let names: Vec<_> = registry
            .list_children(&owner)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Old"]);
    }

    #[test]
    fn test_malformed_foreign_record_does_not_break_listing() {
        let (registry, store, _temp_dir) = create_test_registry();
        let owner = session("pat@example.com");
        registry.create_child(&owner, NewChild::named("Timmy")).unwrap();

        let mut children = store.load(Collection::Children).unwrap();
        children.insert(
            "2".to_string(),
            json!({"owner_email": "sam@example.com", "age": "five"}),
        );
        store.save(Collection::Children, &children).unwrap();

        let listed = registry.list_children(&owner).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "Timmy");
        assert!(matches!(
            registry.get_child(&owner, "2"),
            Err(ChildError::NotFound { .. })
        ));

        let result = registry.list_children(&session("sam@example.com"));
        assert!(matches!(
            result,
            Err(ChildError::Store(Error::CorruptCollection { .. }))
        ));
    }

    #[test]
    fn test_reads_legacy_records() {
        let (registry, store, _temp_dir) = create_test_registry();
        let mut children = Records::new();
        children.insert(
            "1".to_string(),
            json!({
                "name": "Timmy",
                "age": 5,
                "notes": "",
                "photo": "",
                "parents": [{"name": "Ann", "email": "ann@x.com", "phone": "555"}],
                "created_by": "pat@example.com"
            }),
        );
        store.save(Collection::Children, &children).unwrap();

        let listed = registry.list_children(&session("pat@example.com")).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].guardians[0].name, "Ann");
    }
}
