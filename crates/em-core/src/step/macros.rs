/// Declara un struct de artifact con sus derives e `ArtifactSpec`.
///
/// `typed_artifact!(Name { a: A, b: B });` genera `pub struct Name` con esos
/// campos más `schema_version: u32`; `TYPE_NAME` es el nombre del struct.
#[macro_export]
macro_rules! typed_artifact {
    ($name:ident { $($fname:ident : $fty:ty),+ $(,)? }) => {
        #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
        pub struct $name {
            $(pub $fname: $fty,)+
            pub schema_version: u32,
        }

        impl $crate::model::ArtifactSpec for $name {
            const TYPE_NAME: &'static str = stringify!($name);
        }
    };
}
