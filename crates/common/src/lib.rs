// annotator-common: wire types shared by the annotator daemon and its clients

pub mod image;
pub mod metadata;
pub mod protocol;
