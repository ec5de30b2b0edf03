pub mod binding_layout;
pub mod shader_object;
