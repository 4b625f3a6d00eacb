//! Geometric multigrid and the surface/level transfer it is built on.

pub mod gmg;
pub mod projection;

pub use gmg::GeometricMultigrid;
pub use projection::{
    add_projection_of_shadows, copy_matrix_by_full_mapping, copy_matrix_by_mapping,
    create_surface_to_toplevel_map, project_level_to_surface, project_surface_to_level,
    set_zero_on_shadowing,
};
