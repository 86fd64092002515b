//! Integration tests spanning scene, cameras and viewports
