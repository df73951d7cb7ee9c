//! Default subject list inserted into an empty catalog.

use serde::Serialize;

/// A subject row without an id; the store assigns one on insert.
#[derive(Debug, Clone, Serialize)]
pub struct SubjectSeed {
    pub name: &'static str,
    pub code: &'static str,
    pub description: &'static str,
    pub color: &'static str,
    pub icon: &'static str,
}

pub fn default_subjects() -> Vec<SubjectSeed> {
    vec![
        SubjectSeed {
            name: "Programming Fundamentals",
            code: "BCA-101",
            description: "C/C++, Java, Python programming concepts and practical implementations",
            color: "bg-blue-500",
            icon: "💻",
        },
        SubjectSeed {
            name: "Data Structures & Algorithms",
            code: "BCA-201",
            description: "Arrays, Linked Lists, Trees, Graphs, Sorting & Searching algorithms",
            color: "bg-green-500",
            icon: "🔗",
        },
        SubjectSeed {
            name: "Database Management Systems",
            code: "BCA-301",
            description: "SQL, NoSQL, Database design, Normalization, and RDBMS concepts",
            color: "bg-purple-500",
            icon: "🗄️",
        },
        SubjectSeed {
            name: "Web Development",
            code: "BCA-401",
            description: "HTML, CSS, JavaScript, React, Node.js, and full-stack development",
            color: "bg-orange-500",
            icon: "🌐",
        },
        SubjectSeed {
            name: "Software Engineering",
            code: "BCA-501",
            description: "SDLC, Agile, Testing, Project management, and software design patterns",
            color: "bg-red-500",
            icon: "⚙️",
        },
        SubjectSeed {
            name: "Computer Networks",
            code: "BCA-601",
            description: "TCP/IP, OSI model, Network protocols, Security, and network administration",
            color: "bg-indigo-500",
            icon: "🔗",
        },
    ]
}
