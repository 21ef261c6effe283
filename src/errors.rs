//! Error Types
//!
//! This module defines the error types used throughout the renderer.
//!
//! # Overview
//!
//! The main error type [`RenderError`] covers:
//! - GPU initialization failures
//! - Shader loading, compilation and program linking
//! - Render target (framebuffer) construction
//! - Logic-level misuse of resources (e.g. cubemap views of 2D textures)
//! - Scene-graph lookups
//!
//! Shader and framebuffer errors are fatal to the operation that triggered
//! them. They carry the offending file paths and the front-end diagnostic so
//! they can be diagnosed without re-running.
//!
//! # Usage
//!
//! All fallible APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, RenderError>`.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for the renderer.
#[derive(Error, Debug)]
pub enum RenderError {
    // ========================================================================
    // GPU & Surface Errors
    // ========================================================================
    /// Failed to request a compatible GPU adapter.
    #[error("Failed to request WGPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// Failed to create the GPU device.
    #[error("Failed to create WGPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    /// The window could not back a surface.
    #[error("Failed to create surface: {0}")]
    SurfaceCreateFailed(#[from] wgpu::CreateSurfaceError),

    /// The presentable surface could not provide a frame.
    #[error("Surface error: {0}")]
    Surface(String),

    // ========================================================================
    // Shader Errors
    // ========================================================================
    /// The shader source file could not be read from disk or the embedded set.
    #[error("Failed to read the shader. Path to the file: {}", path.display())]
    ShaderRead {
        /// Path that was requested
        path: PathBuf,
        /// Underlying I/O failure, when the file exists but could not be read
        #[source]
        source: Option<std::io::Error>,
    },

    /// Defines were requested but the source has no `#version` line to anchor them.
    #[error("Shader doesn't contain the \"#version\" directive.\nPath to the file: {}", path.display())]
    MissingVersionDirective {
        /// Path of the offending source
        path: PathBuf,
    },

    /// A single shader stage failed to compile.
    #[error("Failed to compile the {stage} shader.\nPath to the file: {}\nError message: {log}", path.display())]
    ShaderCompile {
        /// `"vertex"` or `"fragment"`
        stage: &'static str,
        /// Path of the offending source
        path: PathBuf,
        /// Front-end diagnostic text
        log: String,
    },

    /// Vertex and fragment stages compiled but do not form a valid program.
    #[error(
        "Failed to link the program.\nPath to the vertex shader file: {}\nPath to the fragment shader file: {}\nError message: {log}",
        vertex_path.display(),
        fragment_path.display()
    )]
    ProgramLink {
        /// Vertex stage source path
        vertex_path: PathBuf,
        /// Fragment stage source path
        fragment_path: PathBuf,
        /// Interface mismatch description
        log: String,
    },

    // ========================================================================
    // Render Target Errors
    // ========================================================================
    /// A render target could not be assembled into a usable attachment set.
    #[error("Failed to initialize the {target} framebuffer: {reason}")]
    IncompleteFramebuffer {
        /// Human-readable target name
        target: &'static str,
        /// Why the attachment set is unusable
        reason: String,
    },

    /// Reading a GPU buffer back to the CPU failed.
    #[error("GPU readback failed: {0}")]
    Readback(String),

    // ========================================================================
    // Logic Errors
    // ========================================================================
    /// A cubemap-only operation was requested on a 2D texture.
    #[error("Unable to {operation} because the given texture is not a cubemap.")]
    NotACubemap {
        /// What was being attempted
        operation: &'static str,
    },

    /// A 2D-only operation was requested on a cubemap texture.
    #[error("Unable to {operation} because the given texture is a cubemap.")]
    IsACubemap {
        /// What was being attempted
        operation: &'static str,
    },

    /// A node handle did not name a live node, or was not a child of the given parent.
    #[error("Scene node not found: {0}")]
    NodeNotFound(String),

    // ========================================================================
    // Configuration & I/O Errors
    // ========================================================================
    /// Settings are well-formed but describe an unusable configuration.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// Settings file could not be parsed.
    #[error("Settings parse error: {0}")]
    Settings(#[from] serde_json::Error),

    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl RenderError {
    /// Returns `true` for errors that the frame loop must not try to recover from.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Surface(_) | Self::Readback(_) | Self::NodeNotFound(_))
    }
}

/// Alias for `Result<T, RenderError>`.
pub type Result<T> = std::result::Result<T, RenderError>;
