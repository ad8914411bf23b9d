//! Superclass chains of common classes from the Java class library
//!
//! Class files for the JDK are usually not on hand when frames are computed, yet their exception
//! and collection classes meet at almost every merge point of ordinary code.

/// Class and its direct superclass
const JAVA_CLASSES: &[(&str, &str)] = &[
    // java.lang
    ("java/lang/String", "java/lang/Object"),
    ("java/lang/Class", "java/lang/Object"),
    ("java/lang/Boolean", "java/lang/Object"),
    ("java/lang/Character", "java/lang/Object"),
    ("java/lang/Number", "java/lang/Object"),
    ("java/lang/Byte", "java/lang/Number"),
    ("java/lang/Short", "java/lang/Number"),
    ("java/lang/Integer", "java/lang/Number"),
    ("java/lang/Long", "java/lang/Number"),
    ("java/lang/Float", "java/lang/Number"),
    ("java/lang/Double", "java/lang/Number"),
    ("java/lang/Math", "java/lang/Object"),
    ("java/lang/System", "java/lang/Object"),
    ("java/lang/Thread", "java/lang/Object"),
    ("java/lang/Enum", "java/lang/Object"),
    ("java/lang/Record", "java/lang/Object"),
    ("java/lang/AbstractStringBuilder", "java/lang/Object"),
    ("java/lang/StringBuilder", "java/lang/AbstractStringBuilder"),
    ("java/lang/StringBuffer", "java/lang/AbstractStringBuilder"),
    ("java/math/BigInteger", "java/lang/Number"),
    ("java/math/BigDecimal", "java/lang/Number"),
    // Throwables
    ("java/lang/Throwable", "java/lang/Object"),
    ("java/lang/Exception", "java/lang/Throwable"),
    ("java/lang/Error", "java/lang/Throwable"),
    ("java/lang/RuntimeException", "java/lang/Exception"),
    ("java/lang/ArithmeticException", "java/lang/RuntimeException"),
    ("java/lang/ArrayStoreException", "java/lang/RuntimeException"),
    ("java/lang/ClassCastException", "java/lang/RuntimeException"),
    ("java/lang/IllegalArgumentException", "java/lang/RuntimeException"),
    ("java/lang/NumberFormatException", "java/lang/IllegalArgumentException"),
    ("java/lang/IllegalStateException", "java/lang/RuntimeException"),
    ("java/lang/IllegalMonitorStateException", "java/lang/RuntimeException"),
    ("java/lang/IndexOutOfBoundsException", "java/lang/RuntimeException"),
    ("java/lang/ArrayIndexOutOfBoundsException", "java/lang/IndexOutOfBoundsException"),
    ("java/lang/StringIndexOutOfBoundsException", "java/lang/IndexOutOfBoundsException"),
    ("java/lang/NegativeArraySizeException", "java/lang/RuntimeException"),
    ("java/lang/NullPointerException", "java/lang/RuntimeException"),
    ("java/lang/SecurityException", "java/lang/RuntimeException"),
    ("java/lang/UnsupportedOperationException", "java/lang/RuntimeException"),
    ("java/lang/CloneNotSupportedException", "java/lang/Exception"),
    ("java/lang/InterruptedException", "java/lang/Exception"),
    ("java/lang/ReflectiveOperationException", "java/lang/Exception"),
    ("java/lang/ClassNotFoundException", "java/lang/ReflectiveOperationException"),
    ("java/lang/IllegalAccessException", "java/lang/ReflectiveOperationException"),
    ("java/lang/InstantiationException", "java/lang/ReflectiveOperationException"),
    ("java/lang/NoSuchFieldException", "java/lang/ReflectiveOperationException"),
    ("java/lang/NoSuchMethodException", "java/lang/ReflectiveOperationException"),
    ("java/lang/reflect/InvocationTargetException", "java/lang/ReflectiveOperationException"),
    ("java/lang/AssertionError", "java/lang/Error"),
    ("java/lang/LinkageError", "java/lang/Error"),
    ("java/lang/NoClassDefFoundError", "java/lang/LinkageError"),
    ("java/lang/ExceptionInInitializerError", "java/lang/LinkageError"),
    ("java/lang/VirtualMachineError", "java/lang/Error"),
    ("java/lang/OutOfMemoryError", "java/lang/VirtualMachineError"),
    ("java/lang/StackOverflowError", "java/lang/VirtualMachineError"),
    ("java/io/IOException", "java/lang/Exception"),
    ("java/io/EOFException", "java/io/IOException"),
    ("java/io/FileNotFoundException", "java/io/IOException"),
    ("java/io/UnsupportedEncodingException", "java/io/IOException"),
    ("java/io/UncheckedIOException", "java/lang/RuntimeException"),
    ("java/util/NoSuchElementException", "java/lang/RuntimeException"),
    ("java/util/ConcurrentModificationException", "java/lang/RuntimeException"),
    ("java/util/concurrent/ExecutionException", "java/lang/Exception"),
    ("java/util/concurrent/TimeoutException", "java/lang/Exception"),
    ("java/util/concurrent/CancellationException", "java/lang/IllegalStateException"),
    // java.io streams
    ("java/io/InputStream", "java/lang/Object"),
    ("java/io/OutputStream", "java/lang/Object"),
    ("java/io/Reader", "java/lang/Object"),
    ("java/io/Writer", "java/lang/Object"),
    // java.util collections
    ("java/util/AbstractCollection", "java/lang/Object"),
    ("java/util/AbstractList", "java/util/AbstractCollection"),
    ("java/util/AbstractSequentialList", "java/util/AbstractList"),
    ("java/util/ArrayList", "java/util/AbstractList"),
    ("java/util/LinkedList", "java/util/AbstractSequentialList"),
    ("java/util/Vector", "java/util/AbstractList"),
    ("java/util/Stack", "java/util/Vector"),
    ("java/util/AbstractSet", "java/util/AbstractCollection"),
    ("java/util/HashSet", "java/util/AbstractSet"),
    ("java/util/LinkedHashSet", "java/util/HashSet"),
    ("java/util/TreeSet", "java/util/AbstractSet"),
    ("java/util/EnumSet", "java/util/AbstractSet"),
    ("java/util/AbstractQueue", "java/util/AbstractCollection"),
    ("java/util/PriorityQueue", "java/util/AbstractQueue"),
    ("java/util/ArrayDeque", "java/util/AbstractCollection"),
    ("java/util/AbstractMap", "java/lang/Object"),
    ("java/util/HashMap", "java/util/AbstractMap"),
    ("java/util/LinkedHashMap", "java/util/HashMap"),
    ("java/util/TreeMap", "java/util/AbstractMap"),
    ("java/util/EnumMap", "java/util/AbstractMap"),
    ("java/util/IdentityHashMap", "java/util/AbstractMap"),
    ("java/util/WeakHashMap", "java/util/AbstractMap"),
    ("java/util/concurrent/ConcurrentHashMap", "java/util/AbstractMap"),
];

/// Interfaces (all of which merge with anything to `java/lang/Object`)
const JAVA_INTERFACES: &[&str] = &[
    "java/lang/AutoCloseable",
    "java/lang/CharSequence",
    "java/lang/Cloneable",
    "java/lang/Comparable",
    "java/lang/Iterable",
    "java/lang/Runnable",
    "java/io/Closeable",
    "java/io/Serializable",
    "java/util/Collection",
    "java/util/Deque",
    "java/util/Iterator",
    "java/util/List",
    "java/util/Map",
    "java/util/Queue",
    "java/util/Set",
    "java/util/SortedMap",
    "java/util/SortedSet",
    "java/util/concurrent/Callable",
    "java/util/function/Function",
    "java/util/function/Supplier",
    "java/util/function/Consumer",
    "java/util/function/Predicate",
];

/// Superclass and interface-ness of a well-known library class
pub(super) fn java_class(name: &str) -> Option<(Option<&'static str>, bool)> {
    if name == "java/lang/Object" {
        return Some((None, false));
    }
    if let Some((_, super_name)) = JAVA_CLASSES.iter().find(|(class, _)| *class == name) {
        return Some((Some(*super_name), false));
    }
    JAVA_INTERFACES
        .iter()
        .find(|interface| **interface == name)
        .map(|_| (Some("java/lang/Object"), true))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn chains_end_at_object() {
        for (class, _) in JAVA_CLASSES {
            let mut current = Some(*class);
            let mut steps = 0;
            while let Some(name) = current {
                let (super_name, is_interface) = java_class(name).unwrap();
                assert!(!is_interface, "{} is listed as a class", name);
                current = super_name;
                steps += 1;
                assert!(steps < 16, "chain of {} does not end", class);
            }
        }
    }

    #[test]
    fn lookups() {
        assert_eq!(
            java_class("java/lang/NumberFormatException"),
            Some((Some("java/lang/IllegalArgumentException"), false))
        );
        assert_eq!(
            java_class("java/util/List"),
            Some((Some("java/lang/Object"), true))
        );
        assert_eq!(java_class("p/Unknown"), None);
    }
}
