pub mod authority;
pub mod entity;
pub mod evidence;
pub mod fusion;
pub mod item;
pub mod modality;
pub mod profile;
pub mod traversal;

pub use authority::AuthorityTable;
pub use entity::{DictionaryExtractor, Entity, ExtractionTier};
pub use evidence::{CitationEntry, ContextChunk, PackedContext, PackingOptions};
pub use item::{EvidencePath, FusedResult, RankedItem, SourceRef};
pub use modality::{Modality, ModalityMap};
pub use profile::{FusionWeights, GraphView, InvalidProfile, ProfileOverrides, SearchProfile};
pub use traversal::{GraphEdge, Traversal};
