// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Coordinates the other layers to accomplish one goal:
//
//   session.rs           — the mode controller: fixes the run
//                          mode, trains when asked, restores the
//                          checkpoint before any inference
//
//   runner.rs            — the inference entry points handed out
//                          by a started session
//
//   mappings_use_case.rs — lists and exports test-set mappings
//
// No model math and no printing here; that belongs to Layers 5
// and 1.
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

/// Mode controller and training workflow
pub mod session;

/// Random / first-N captioning of the test set
pub mod runner;

/// Test-set mapping listing and export
pub mod mappings_use_case;
