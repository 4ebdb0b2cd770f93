pub mod bowditch;
pub mod connection;
pub mod continuation;
pub mod contours;
pub mod error;
pub mod modular;
pub mod s04;
pub mod solvers;
pub mod t11;
/// The `cp1_core` crate computes holonomy of CP¹ structures on the
/// four-punctured sphere and the once-punctured torus, and classifies whether
/// the resulting groups are discrete.
///
/// Key components:
/// - **Contours**: polygonal loops around pairs of punctures, valid over documented regions of λ.
/// - **Continuation**: adaptive Tsit5 integration of w'' + ½q·w = 0 along contour edges.
/// - **S04 / T11**: trace coordinates of the holonomy, with fundamental-domain reduction.
/// - **Bowditch**: bounded Farey-tree search for violations of Jorgensen's inequality.
pub mod traits;
pub mod types;
