use crate::jvm::class_file::ClassFile;
use crate::jvm::Error;
use std::collections::BTreeMap;

/// Set of classes, keyed by their (internal form) class name
///
/// Iteration is in class name order.
#[derive(Debug, Default)]
pub struct ClassSet {
    classes: BTreeMap<String, ClassFile>,
}

impl ClassSet {
    /// New empty set
    pub fn new() -> ClassSet {
        ClassSet {
            classes: BTreeMap::new(),
        }
    }

    /// Add a class to the set
    ///
    /// Returns `true` if a class with the same name was already there, in which case the set is
    /// left unchanged.
    pub fn add(&mut self, class: ClassFile) -> Result<bool, Error> {
        let name = class.class_name()?.to_owned();
        if self.classes.contains_key(&name) {
            return Ok(true);
        }
        self.classes.insert(name, class);
        Ok(false)
    }

    pub fn get(&self, class_name: &str) -> Option<&ClassFile> {
        self.classes.get(class_name)
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.classes.contains_key(class_name)
    }

    pub fn remove(&mut self, class_name: &str) -> Option<ClassFile> {
        self.classes.remove(class_name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn class_names(&self) -> Vec<&str> {
        self.classes.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ClassFile)> + '_ {
        self.classes
            .iter()
            .map(|(name, class)| (name.as_str(), class))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::Version;
    use crate::jvm::model::ClassBuilder;
    use crate::jvm::ClassAccessFlags;

    fn class(name: &str, version: Version) -> ClassFile {
        ClassBuilder::new(
            version,
            ClassAccessFlags::PUBLIC,
            name,
            Some("java/lang/Object"),
            &[],
        )
        .unwrap()
        .build()
        .unwrap()
    }

    #[test]
    fn first_class_with_a_name_wins() {
        let mut set = ClassSet::new();
        assert!(set.is_empty());
        assert!(!set.add(class("b/Second", Version::JAVA8)).unwrap());
        assert!(!set.add(class("a/First", Version::JAVA8)).unwrap());
        assert!(set.add(class("a/First", Version::JAVA17)).unwrap());

        assert_eq!(set.len(), 2);
        assert_eq!(set.class_names(), vec!["a/First", "b/Second"]);
        assert_eq!(set.get("a/First").unwrap().version, Version::JAVA8);

        let removed = set.remove("a/First").unwrap();
        assert_eq!(removed.class_name().unwrap(), "a/First");
        assert!(!set.contains("a/First"));
        assert_eq!(set.iter().count(), 1);
    }
}
