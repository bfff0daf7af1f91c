//! notebert - jot down notes and recall the closest one by meaning.
//!
//! Notes go into an append-only store keyed by insertion order. A recall
//! embeds every stored note with a
//! [ColBERT](https://github.com/stanford-futuredata/ColBERT) model, finds the
//! note nearest to the query, and reflows it so that markdown and code
//! squashed onto one line get their line breaks back.
//!
//! # Quick start
//!
//! ```no_run
//! use notebert::{ConfigDb, DataDir, ModelManager, NoteStore};
//! use notebert::recall::{self, Recall, RecallOptions};
//!
//! let data_dir = DataDir::resolve(None).unwrap();
//! let config_db = ConfigDb::open(&data_dir.config_db()).unwrap();
//! let kind = config_db.resolve_store_kind(None).unwrap();
//! let store = NoteStore::open(kind, &data_dir).unwrap();
//! let mut model = ModelManager::with_model_id(config_db.resolve_model_id(None).unwrap());
//!
//! recall::add_note(&store, "### Setup1. install2. run").unwrap();
//!
//! match recall::recall(&store, &mut model, "how do I set up", RecallOptions::default())
//!     .unwrap()
//! {
//!     Recall::Found(hit) => println!("{}:\n{}", hit.key, hit.text),
//!     Recall::NoNotes => println!("no notes yet"),
//! }
//! ```

pub mod checklist;
pub mod cli;
pub mod config_db;
pub mod data_dir;
pub mod embedding;
pub mod error;
pub mod mcp;
pub mod model_manager;
pub mod note_db;
pub mod note_store;
pub mod recall;
pub mod reflow;
pub mod retrieval;
pub mod text_util;

pub use config_db::ConfigDb;
pub use data_dir::DataDir;
pub use embedding::Embedder;
pub use error::{Error, Result};
pub use model_manager::ModelManager;
pub use note_store::{NoteKey, NoteStore, Notes, StoreKind};
pub use reflow::reflow;
pub use retrieval::{Match, RetrievalIndex};
