// TinyLang: a pocket-sized compiler and stack VM.
//
// Copyright (C) 2020  Brandon Lewis
//
// This program is free software: you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public License
// as published by the Free Software Foundation, either version 3 of
// the License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this program.  If not, see
// <https://www.gnu.org/licenses/>.

use std::collections::HashMap;


// Datastructure to manage lexical scoping.
//
// The stack always holds at least one scope: the global one.
pub struct Env<T> {
    stack: Vec<HashMap<String, T>>,
}


impl<T> Env<T> {
    pub fn new() -> Env<T> {
        Env { stack: vec![HashMap::new()] }
    }

    // Begin a new scope.
    pub fn push(&mut self) {
        self.stack.push(HashMap::new());
    }

    // End the current scope, dropping its bindings.
    pub fn pop(&mut self) {
        assert!(self.stack.len() > 1, "popped the global scope");
        self.stack.pop();
    }

    // Depth of the current scope; the global scope is depth 0.
    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    // Look up an identifier from anywhere in our scope chain.
    // The innermost binding wins.
    pub fn get(&self, key: &str) -> Option<&T> {
        self.stack.iter().rev().find_map(|scope| scope.get(key))
    }

    // Insert a value in the current scope. Returns false, leaving
    // the existing binding in place, if the key is already bound in
    // this scope.
    pub fn define(&mut self, key: &str, value: T) -> bool {
        let scope = self.stack.last_mut().unwrap();
        if scope.contains_key(key) {
            false
        } else {
            scope.insert(String::from(key), value);
            true
        }
    }
}
