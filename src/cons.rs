// ABOUTME: Mutable pair cell and proper-list helpers

use crate::value::Val;
use std::cell::RefCell;
use std::rc::Rc;

/// A mutable pair. A proper list is nil or a cons whose rest is a proper
/// list; a dotted list ends in a non-cons, non-nil rest.
#[derive(Debug)]
pub struct Cons {
    first: RefCell<Val>,
    rest: RefCell<Val>,
}

impl Cons {
    pub fn new(first: Val, rest: Val) -> Self {
        Cons {
            first: RefCell::new(first),
            rest: RefCell::new(rest),
        }
    }

    pub fn first(&self) -> Val {
        self.first.borrow().clone()
    }

    pub fn rest(&self) -> Val {
        self.rest.borrow().clone()
    }

    pub fn set_first(&self, value: Val) {
        *self.first.borrow_mut() = value;
    }

    pub fn set_rest(&self, value: Val) {
        *self.rest.borrow_mut() = value;
    }
}

pub fn cons(first: Val, rest: Val) -> Val {
    Val::Cons(Rc::new(Cons::new(first, rest)))
}

/// Build a proper list from the given items.
pub fn list_from(items: Vec<Val>) -> Val {
    let mut result = Val::Nil;
    for item in items.into_iter().rev() {
        result = cons(item, result);
    }
    result
}

/// Build a dotted list: items followed by `tail` as the final rest.
pub fn list_from_dotted(items: Vec<Val>, tail: Val) -> Val {
    let mut result = tail;
    for item in items.into_iter().rev() {
        result = cons(item, result);
    }
    result
}

/// Iterate the elements of a list, stopping at nil or a dotted tail.
pub fn iter(value: &Val) -> ListIter {
    ListIter {
        cursor: value.clone(),
    }
}

pub struct ListIter {
    cursor: Val,
}

impl Iterator for ListIter {
    type Item = Val;

    fn next(&mut self) -> Option<Val> {
        match self.cursor.clone() {
            Val::Cons(cell) => {
                self.cursor = cell.rest();
                Some(cell.first())
            }
            _ => None,
        }
    }
}

/// Split a list into its elements and its final tail (nil for proper lists).
pub fn to_vec(value: &Val) -> (Vec<Val>, Val) {
    let mut items = Vec::new();
    let mut cursor = value.clone();
    loop {
        match cursor {
            Val::Cons(cell) => {
                items.push(cell.first());
                cursor = cell.rest();
            }
            tail => return (items, tail),
        }
    }
}

/// Length of a proper list; None for dotted lists and non-lists.
pub fn length(value: &Val) -> Option<usize> {
    let mut count = 0;
    let mut cursor = value.clone();
    loop {
        match cursor {
            Val::Nil => return Some(count),
            Val::Cons(cell) => {
                count += 1;
                cursor = cell.rest();
            }
            _ => return None,
        }
    }
}

/// Reverse of a proper list; None for dotted lists and non-lists.
pub fn reverse(value: &Val) -> Option<Val> {
    let mut result = Val::Nil;
    let mut cursor = value.clone();
    loop {
        match cursor {
            Val::Nil => return Some(result),
            Val::Cons(cell) => {
                result = cons(cell.first(), result);
                cursor = cell.rest();
            }
            _ => return None,
        }
    }
}

pub fn is_proper_list(value: &Val) -> bool {
    length(value).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_from_and_length() {
        let list = list_from(vec![Val::Int(1), Val::Int(2), Val::Int(3)]);
        assert_eq!(length(&list), Some(3));
        assert_eq!(length(&Val::Nil), Some(0));
    }

    #[test]
    fn test_dotted_list_has_no_length() {
        let dotted = cons(Val::Int(1), Val::Int(2));
        assert_eq!(length(&dotted), None);
        assert!(!is_proper_list(&dotted));
    }

    #[test]
    fn test_reverse_roundtrip() {
        let list = list_from(vec![Val::Int(1), Val::Int(2), Val::Int(3)]);
        let twice = reverse(&reverse(&list).unwrap()).unwrap();
        assert!(list.equal(&twice));
        assert_eq!(
            length(&list),
            length(&reverse(&list).unwrap())
        );
    }

    #[test]
    fn test_iter_stops_at_dotted_tail() {
        let dotted = list_from_dotted(vec![Val::Int(1), Val::Int(2)], Val::Int(3));
        let items: Vec<Val> = iter(&dotted).collect();
        assert_eq!(items, vec![Val::Int(1), Val::Int(2)]);

        let (items, tail) = to_vec(&dotted);
        assert_eq!(items.len(), 2);
        assert_eq!(tail, Val::Int(3));
    }

    #[test]
    fn test_mutation_through_shared_cell() {
        let list = list_from(vec![Val::Int(1), Val::Int(2)]);
        if let Val::Cons(cell) = &list {
            cell.set_first(Val::Int(9));
        }
        assert_eq!(list.to_string(), "(9 2)");
    }
}
