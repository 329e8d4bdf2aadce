// ABOUTME: Runtime environment frames — block-scoped locals released in reverse-introduction order

use crate::interpreter::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// One block or function-call frame: a name→value map plus the order names
/// were introduced in, so `pop` can release them in reverse.
struct Frame {
    bindings: HashMap<String, Value>,
    introduced: Vec<String>,
}

impl Frame {
    fn new() -> Self {
        Frame { bindings: HashMap::new(), introduced: Vec::new() }
    }
}

/// The interpreter's environment: a stack of frames (one per active block)
/// sitting on top of a shared global map. `self` is just another binding in
/// the innermost function frame — no separate slot is needed.
pub struct Env {
    frames: Vec<Frame>,
    globals: Rc<RefCell<HashMap<String, Value>>>,
}

impl Env {
    pub fn new(globals: Rc<RefCell<HashMap<String, Value>>>) -> Self {
        Env { frames: vec![Frame::new()], globals }
    }

    pub fn push_block(&mut self) {
        self.frames.push(Frame::new());
    }

    /// Releases every binding the exiting block introduced, in reverse
    /// order, dropping their `Rc` handles deterministically.
    pub fn pop_block(&mut self) {
        if let Some(mut frame) = self.frames.pop() {
            for name in frame.introduced.iter().rev() {
                // Removing (rather than letting the `HashMap` drop as a
                // whole) fixes the release order to match introduction.
                let _ = frame.bindings.remove(name);
            }
        }
    }

    pub fn define(&mut self, name: &str, value: Value) {
        let frame = self.frames.last_mut().expect("at least one frame");
        if !frame.bindings.contains_key(name) {
            frame.introduced.push(name.to_string());
        }
        frame.bindings.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.get_local(name).or_else(|| self.get_global(name))
    }

    /// Looks up a name in the frame stack only, skipping globals — used by
    /// identifier resolution's "local env, then `self.<name>`, then
    /// globals" order, where the `self` field check must sit between the
    /// two.
    pub fn get_local(&self, name: &str) -> Option<Value> {
        for frame in self.frames.iter().rev() {
            if let Some(v) = frame.bindings.get(name) {
                return Some(v.clone());
            }
        }
        None
    }

    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.globals.borrow().get(name).cloned()
    }

    /// Overwrites an existing binding in whichever frame (or the globals)
    /// defines it. Returns `false` if the name isn't bound anywhere.
    pub fn assign(&mut self, name: &str, value: Value) -> bool {
        for frame in self.frames.iter_mut().rev() {
            if frame.bindings.contains_key(name) {
                frame.bindings.insert(name.to_string(), value);
                return true;
            }
        }
        if self.globals.borrow().contains_key(name) {
            self.globals.borrow_mut().insert(name.to_string(), value);
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn globals() -> Rc<RefCell<HashMap<String, Value>>> {
        Rc::new(RefCell::new(HashMap::new()))
    }

    #[test]
    fn child_block_shadows_then_releases_on_pop() {
        let mut env = Env::new(globals());
        env.define("x", Value::i32(1));
        env.push_block();
        env.define("x", Value::i32(2));
        assert_eq!(env.get("x").unwrap().as_int(), Some(2));
        env.pop_block();
        assert_eq!(env.get("x").unwrap().as_int(), Some(1));
    }

    #[test]
    fn assign_finds_the_defining_frame() {
        let mut env = Env::new(globals());
        env.define("x", Value::i32(1));
        env.push_block();
        assert!(env.assign("x", Value::i32(9)));
        env.pop_block();
        assert_eq!(env.get("x").unwrap().as_int(), Some(9));
    }

    #[test]
    fn assign_to_unbound_name_fails() {
        let mut env = Env::new(globals());
        assert!(!env.assign("nope", Value::Null));
    }

    #[test]
    fn globals_are_visible_without_a_frame_binding() {
        let g = globals();
        g.borrow_mut().insert("G".to_string(), Value::i32(7));
        let env = Env::new(g);
        assert_eq!(env.get("G").unwrap().as_int(), Some(7));
    }
}
