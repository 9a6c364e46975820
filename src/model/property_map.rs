//! PropertyMap: the mutable attribute store on a `Node`.

use std::collections::HashMap;
use super::Value;

/// A map of attribute names to values.
pub type PropertyMap = HashMap<String, Value>;
